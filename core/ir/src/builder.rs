//! Structured IR construction.
//!
//! The builder exposes one factory per node variant. Every factory validates
//! the arity and shape of its arguments synchronously (failing with
//! [`InvalidNodeShape`]), assigns a fresh deterministic ID, attaches the
//! optional source location, and never mutates its arguments. The builder
//! owns the unit's [`IdGenerator`]; creating a new builder starts a new ID
//! sequence.

use rustc_hash::FxHashSet;

use crate::errors::InvalidNodeShape;
use crate::id::{IdGenerator, NodeId};
use crate::metadata::{self, MetaValue, Metadata};
use crate::nodes::{
    ArrayLiteral, AssignOperator, Assignment, BinaryOp, BinaryOperator, Block, Break, Call, Case,
    Conditional, Continue, DoWhile, Expr, ExpressionStmt, For, FunctionDecl, Identifier, If,
    Literal, LiteralValue, Member, NodeKind, ObjectLiteral, Parameter, Program, Property, Return,
    Span, Stmt, Switch, UnaryOp, UnaryOperator, VarDecl, While,
};
use crate::types::Type;

/// Surface declaration kinds accepted on `VarDecl` nodes.
pub const DECLARATION_KINDS: &[&str] = &["let", "const", "var"];

pub struct Builder {
    ids: IdGenerator,
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new()
    }
}

impl Builder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ids: IdGenerator::new(),
        }
    }

    fn fresh(&mut self) -> NodeId {
        self.ids.next_id()
    }

    /// Number of nodes created so far. Exposed for uniqueness checks.
    #[must_use]
    pub fn nodes_created(&self) -> u64 {
        self.ids.issued()
    }

    /// # Errors
    ///
    /// Never fails today; the `Program` shape is fully enforced by the type
    /// of `body`. Kept fallible for uniformity with the other factories.
    pub fn program(
        &mut self,
        body: Vec<Stmt>,
        location: Option<Span>,
    ) -> Result<Program, InvalidNodeShape> {
        Ok(Program {
            id: self.fresh(),
            ty: None,
            location,
            metadata: Metadata::new(),
            body,
        })
    }

    /// # Errors
    ///
    /// Fails when the name is empty or two parameters share a name.
    pub fn function_decl(
        &mut self,
        name: impl Into<String>,
        params: Vec<Parameter>,
        body: Block,
        location: Option<Span>,
    ) -> Result<FunctionDecl, InvalidNodeShape> {
        let name = name.into();
        if name.is_empty() {
            return Err(InvalidNodeShape::new(
                NodeKind::FunctionDecl,
                "function name must not be empty",
                location,
            ));
        }
        check_unique_params(NodeKind::FunctionDecl, &params, location)?;
        Ok(FunctionDecl {
            id: self.fresh(),
            ty: None,
            location,
            metadata: Metadata::new(),
            name,
            params,
            body,
        })
    }

    /// A function value (arrow function or function expression). The node
    /// reuses the `FunctionDecl` kind in expression position; arrows carry
    /// the `isArrow` flag and anonymous functions an empty name.
    ///
    /// # Errors
    ///
    /// Fails when two parameters share a name.
    pub fn function_expr(
        &mut self,
        name: impl Into<String>,
        params: Vec<Parameter>,
        body: Block,
        arrow: bool,
        location: Option<Span>,
    ) -> Result<FunctionDecl, InvalidNodeShape> {
        check_unique_params(NodeKind::FunctionDecl, &params, location)?;
        let mut metadata = Metadata::new();
        if arrow {
            metadata.set_flag(metadata::IS_ARROW);
        }
        Ok(FunctionDecl {
            id: self.fresh(),
            ty: None,
            location,
            metadata,
            name: name.into(),
            params,
            body,
        })
    }

    /// # Errors
    ///
    /// Fails when the parameter name is empty.
    pub fn parameter(
        &mut self,
        name: impl Into<String>,
        is_rest: bool,
        location: Option<Span>,
    ) -> Result<Parameter, InvalidNodeShape> {
        let name = name.into();
        if name.is_empty() {
            return Err(InvalidNodeShape::new(
                NodeKind::Parameter,
                "parameter name must not be empty",
                location,
            ));
        }
        let mut metadata = Metadata::new();
        if is_rest {
            metadata.set_flag(metadata::IS_REST);
        }
        Ok(Parameter {
            id: self.fresh(),
            ty: None,
            location,
            metadata,
            name,
        })
    }

    /// # Errors
    ///
    /// Fails when the name is empty or `kind` is not `let`, `const`, or
    /// `var`.
    pub fn var_decl(
        &mut self,
        name: impl Into<String>,
        kind: &str,
        init: Option<Expr>,
        location: Option<Span>,
    ) -> Result<VarDecl, InvalidNodeShape> {
        let name = name.into();
        if name.is_empty() {
            return Err(InvalidNodeShape::new(
                NodeKind::VarDecl,
                "variable name must not be empty",
                location,
            ));
        }
        if !DECLARATION_KINDS.contains(&kind) {
            return Err(InvalidNodeShape::new(
                NodeKind::VarDecl,
                format!("unknown declaration kind `{kind}`"),
                location,
            ));
        }
        let mut metadata = Metadata::new();
        metadata.insert(
            metadata::DECLARATION_KIND,
            MetaValue::Str(kind.to_string()),
        );
        Ok(VarDecl {
            id: self.fresh(),
            ty: None,
            location,
            metadata,
            name,
            init,
        })
    }

    /// Thin sugar over [`Builder::var_decl`] for the common
    /// declare-and-initialize form.
    ///
    /// # Errors
    ///
    /// Same contract as [`Builder::var_decl`].
    pub fn declare_and_init(
        &mut self,
        name: impl Into<String>,
        kind: &str,
        init: Expr,
        location: Option<Span>,
    ) -> Result<VarDecl, InvalidNodeShape> {
        self.var_decl(name, kind, Some(init), location)
    }

    /// # Errors
    ///
    /// Never fails; kept fallible for uniformity.
    pub fn block(
        &mut self,
        statements: Vec<Stmt>,
        location: Option<Span>,
    ) -> Result<Block, InvalidNodeShape> {
        Ok(Block {
            id: self.fresh(),
            ty: None,
            location,
            metadata: Metadata::new(),
            statements,
        })
    }

    /// # Errors
    ///
    /// Never fails; kept fallible for uniformity.
    pub fn return_stmt(
        &mut self,
        value: Option<Expr>,
        location: Option<Span>,
    ) -> Result<Return, InvalidNodeShape> {
        Ok(Return {
            id: self.fresh(),
            ty: None,
            location,
            metadata: Metadata::new(),
            value,
        })
    }

    /// # Errors
    ///
    /// Never fails; kept fallible for uniformity.
    pub fn if_stmt(
        &mut self,
        condition: Expr,
        consequent: Block,
        alternate: Option<Block>,
        location: Option<Span>,
    ) -> Result<If, InvalidNodeShape> {
        Ok(If {
            id: self.fresh(),
            ty: None,
            location,
            metadata: Metadata::new(),
            condition,
            consequent,
            alternate,
        })
    }

    /// # Errors
    ///
    /// Never fails; kept fallible for uniformity.
    pub fn while_stmt(
        &mut self,
        condition: Expr,
        body: Block,
        location: Option<Span>,
    ) -> Result<While, InvalidNodeShape> {
        Ok(While {
            id: self.fresh(),
            ty: None,
            location,
            metadata: Metadata::new(),
            condition,
            body,
        })
    }

    /// # Errors
    ///
    /// Never fails; kept fallible for uniformity.
    pub fn do_while_stmt(
        &mut self,
        body: Block,
        condition: Expr,
        location: Option<Span>,
    ) -> Result<DoWhile, InvalidNodeShape> {
        Ok(DoWhile {
            id: self.fresh(),
            ty: None,
            location,
            metadata: Metadata::new(),
            body,
            condition,
        })
    }

    /// # Errors
    ///
    /// Never fails; kept fallible for uniformity. Loops without a source
    /// test must be given a synthetic `true` literal by the caller.
    pub fn for_stmt(
        &mut self,
        init: Option<Stmt>,
        test: Expr,
        update: Option<Expr>,
        body: Block,
        location: Option<Span>,
    ) -> Result<For, InvalidNodeShape> {
        Ok(For {
            id: self.fresh(),
            ty: None,
            location,
            metadata: Metadata::new(),
            init,
            test,
            update,
            body,
        })
    }

    /// # Errors
    ///
    /// Fails when more than one case is a `default` (has no test).
    pub fn switch_stmt(
        &mut self,
        discriminant: Expr,
        cases: Vec<Case>,
        location: Option<Span>,
    ) -> Result<Switch, InvalidNodeShape> {
        let defaults = cases.iter().filter(|case| case.test.is_none()).count();
        if defaults > 1 {
            return Err(InvalidNodeShape::new(
                NodeKind::Switch,
                format!("switch has {defaults} default cases"),
                location,
            ));
        }
        Ok(Switch {
            id: self.fresh(),
            ty: None,
            location,
            metadata: Metadata::new(),
            discriminant,
            cases,
        })
    }

    /// # Errors
    ///
    /// Never fails; kept fallible for uniformity.
    pub fn case(
        &mut self,
        test: Option<Expr>,
        body: Vec<Stmt>,
        location: Option<Span>,
    ) -> Result<Case, InvalidNodeShape> {
        Ok(Case {
            id: self.fresh(),
            ty: None,
            location,
            metadata: Metadata::new(),
            test,
            body,
        })
    }

    /// # Errors
    ///
    /// Never fails; kept fallible for uniformity.
    pub fn break_stmt(&mut self, location: Option<Span>) -> Result<Break, InvalidNodeShape> {
        Ok(Break {
            id: self.fresh(),
            ty: None,
            location,
            metadata: Metadata::new(),
        })
    }

    /// # Errors
    ///
    /// Never fails; kept fallible for uniformity.
    pub fn continue_stmt(&mut self, location: Option<Span>) -> Result<Continue, InvalidNodeShape> {
        Ok(Continue {
            id: self.fresh(),
            ty: None,
            location,
            metadata: Metadata::new(),
        })
    }

    /// # Errors
    ///
    /// Never fails; kept fallible for uniformity.
    pub fn expression_stmt(
        &mut self,
        expression: Expr,
        location: Option<Span>,
    ) -> Result<ExpressionStmt, InvalidNodeShape> {
        Ok(ExpressionStmt {
            id: self.fresh(),
            ty: None,
            location,
            metadata: Metadata::new(),
            expression,
        })
    }

    /// # Errors
    ///
    /// Never fails; kept fallible for uniformity.
    pub fn binary(
        &mut self,
        operator: BinaryOperator,
        left: Expr,
        right: Expr,
        location: Option<Span>,
    ) -> Result<BinaryOp, InvalidNodeShape> {
        Ok(BinaryOp {
            id: self.fresh(),
            ty: None,
            location,
            metadata: Metadata::new(),
            operator,
            left,
            right,
        })
    }

    /// # Errors
    ///
    /// Never fails; kept fallible for uniformity.
    pub fn unary(
        &mut self,
        operator: UnaryOperator,
        operand: Expr,
        location: Option<Span>,
    ) -> Result<UnaryOp, InvalidNodeShape> {
        Ok(UnaryOp {
            id: self.fresh(),
            ty: None,
            location,
            metadata: Metadata::new(),
            operator,
            operand,
        })
    }

    /// # Errors
    ///
    /// Never fails; kept fallible for uniformity. Constructor calls set the
    /// `isNew` metadata flag.
    pub fn call(
        &mut self,
        callee: Expr,
        arguments: Vec<Expr>,
        is_new: bool,
        location: Option<Span>,
    ) -> Result<Call, InvalidNodeShape> {
        let mut metadata = Metadata::new();
        if is_new {
            metadata.set_flag(metadata::IS_NEW);
        }
        Ok(Call {
            id: self.fresh(),
            ty: None,
            location,
            metadata,
            callee,
            arguments,
        })
    }

    /// # Errors
    ///
    /// Fails when a non-computed access does not use an identifier property.
    pub fn member(
        &mut self,
        object: Expr,
        property: Expr,
        computed: bool,
        location: Option<Span>,
    ) -> Result<Member, InvalidNodeShape> {
        if !computed && !matches!(property, Expr::Identifier(_)) {
            return Err(InvalidNodeShape::new(
                NodeKind::Member,
                "non-computed member access requires an identifier property",
                location,
            ));
        }
        Ok(Member {
            id: self.fresh(),
            ty: None,
            location,
            metadata: Metadata::new(),
            object,
            property,
            computed,
        })
    }

    /// # Errors
    ///
    /// Never fails; kept fallible for uniformity.
    pub fn array_literal(
        &mut self,
        elements: Vec<Expr>,
        location: Option<Span>,
    ) -> Result<ArrayLiteral, InvalidNodeShape> {
        Ok(ArrayLiteral {
            id: self.fresh(),
            ty: None,
            location,
            metadata: Metadata::new(),
            elements,
        })
    }

    /// # Errors
    ///
    /// Never fails; kept fallible for uniformity.
    pub fn object_literal(
        &mut self,
        properties: Vec<Property>,
        location: Option<Span>,
    ) -> Result<ObjectLiteral, InvalidNodeShape> {
        Ok(ObjectLiteral {
            id: self.fresh(),
            ty: None,
            location,
            metadata: Metadata::new(),
            properties,
        })
    }

    /// # Errors
    ///
    /// Fails when the key is empty.
    pub fn property(
        &mut self,
        key: impl Into<String>,
        value: Expr,
        is_method: bool,
        location: Option<Span>,
    ) -> Result<Property, InvalidNodeShape> {
        let key = key.into();
        if key.is_empty() {
            return Err(InvalidNodeShape::new(
                NodeKind::Property,
                "property key must not be empty",
                location,
            ));
        }
        let mut metadata = Metadata::new();
        if is_method {
            metadata.set_flag(metadata::IS_METHOD);
        }
        Ok(Property {
            id: self.fresh(),
            ty: None,
            location,
            metadata,
            key,
            value,
        })
    }

    /// # Errors
    ///
    /// Fails when the name is empty.
    pub fn identifier(
        &mut self,
        name: impl Into<String>,
        location: Option<Span>,
    ) -> Result<Identifier, InvalidNodeShape> {
        let name = name.into();
        if name.is_empty() {
            return Err(InvalidNodeShape::new(
                NodeKind::Identifier,
                "identifier name must not be empty",
                location,
            ));
        }
        Ok(Identifier {
            id: self.fresh(),
            ty: None,
            location,
            metadata: Metadata::new(),
            name,
        })
    }

    /// Builds a literal annotated with its primitive type.
    ///
    /// # Errors
    ///
    /// Never fails; kept fallible for uniformity. See
    /// [`Builder::literal_typed`] for the checked variant.
    pub fn literal(
        &mut self,
        value: LiteralValue,
        location: Option<Span>,
    ) -> Result<Literal, InvalidNodeShape> {
        let ty = value.primitive_type();
        Ok(Literal {
            id: self.fresh(),
            ty: Some(ty),
            location,
            metadata: Metadata::new(),
            value,
        })
    }

    /// Builds a literal with an explicit annotation.
    ///
    /// # Errors
    ///
    /// Fails when the value is not a member of the declared type.
    pub fn literal_typed(
        &mut self,
        value: LiteralValue,
        ty: Type,
        location: Option<Span>,
    ) -> Result<Literal, InvalidNodeShape> {
        if !value.matches_type(&ty) {
            return Err(InvalidNodeShape::new(
                NodeKind::Literal,
                format!("literal value of type {} declared as {ty}", value.primitive_type()),
                location,
            ));
        }
        Ok(Literal {
            id: self.fresh(),
            ty: Some(ty),
            location,
            metadata: Metadata::new(),
            value,
        })
    }

    /// # Errors
    ///
    /// Fails when the target is not assignable (identifier or member
    /// access).
    pub fn assignment(
        &mut self,
        operator: AssignOperator,
        target: Expr,
        value: Expr,
        location: Option<Span>,
    ) -> Result<Assignment, InvalidNodeShape> {
        if !matches!(target, Expr::Identifier(_) | Expr::Member(_)) {
            return Err(InvalidNodeShape::new(
                NodeKind::Assignment,
                format!("{} is not an assignable target", target.kind()),
                location,
            ));
        }
        Ok(Assignment {
            id: self.fresh(),
            ty: None,
            location,
            metadata: Metadata::new(),
            operator,
            target,
            value,
        })
    }

    /// # Errors
    ///
    /// Never fails; kept fallible for uniformity.
    pub fn conditional(
        &mut self,
        condition: Expr,
        consequent: Expr,
        alternate: Expr,
        location: Option<Span>,
    ) -> Result<Conditional, InvalidNodeShape> {
        Ok(Conditional {
            id: self.fresh(),
            ty: None,
            location,
            metadata: Metadata::new(),
            condition,
            consequent,
            alternate,
        })
    }
}

fn check_unique_params(
    kind: NodeKind,
    params: &[Parameter],
    location: Option<Span>,
) -> Result<(), InvalidNodeShape> {
    let mut seen = FxHashSet::default();
    for param in params {
        if !seen.insert(param.name.as_str()) {
            return Err(InvalidNodeShape::new(
                kind,
                format!("duplicate parameter name `{}`", param.name),
                location,
            ));
        }
    }
    Ok(())
}
