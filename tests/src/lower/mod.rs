mod lowerer;
mod normalizer;
