mod builder;
mod ids;
mod serializer;
mod types;
