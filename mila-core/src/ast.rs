//! パーサーが生成する抽象構文木(AST)のデータ構造を定義します。
//! 各ノードは子ノードを単独で所有し(共有・循環なし)、ソース上の位置を持つ。

extern crate alloc;
use crate::span::Span;
use crate::token::Operator;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// 式または文。Milaでは文も式ノードとして表現する。
#[derive(Debug, PartialEq, Clone)]
pub struct Expression {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone)]
pub enum ExprKind {
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),
    Identifier(String),
    // 関数呼び出し `name(arg, ...)`
    Call {
        name: String,
        args: Vec<Expression>,
    },
    // `begin ... end`
    Block {
        statements: Vec<Expression>,
    },
    Parenthesized(Box<Expression>),
    BinaryOp {
        op: Operator,
        left: Box<Expression>,
        right: Box<Expression>,
        is_boolean: bool,
    },
    // 代入 `target := value`。ノードの位置は代入先の識別子の位置。
    Assign {
        target: String,
        value: Box<Expression>,
    },
    // `if cond then stmt [else stmt]`
    If {
        condition: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Option<Box<Expression>>,
    },
    While {
        condition: Box<Expression>,
        body: Box<Expression>,
    },
    // `for counter := start (to|downto) finish do body`
    For {
        counter: String,
        counter_span: Span,
        start: Box<Expression>,
        finish: Box<Expression>,
        downto: bool,
        body: Box<Expression>,
    },
    Break,
    Exit,
}

impl Expression {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// 値が必要な位置(演算子の被演算子、引数など)に置けるか
    pub fn can_be_operand(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::IntLiteral(_)
                | ExprKind::FloatLiteral(_)
                | ExprKind::StringLiteral(_)
                | ExprKind::Identifier(_)
                | ExprKind::Call { .. }
                | ExprKind::Parenthesized(_)
                | ExprKind::BinaryOp { .. }
        )
    }

    /// 静的に真偽値を表すか
    pub fn is_boolean(&self) -> bool {
        match &self.kind {
            ExprKind::BinaryOp { is_boolean, .. } => *is_boolean,
            ExprKind::Parenthesized(inner) => inner.is_boolean(),
            _ => false,
        }
    }

    /// 木の高さ(葉は1)。解析済みの木は入れ子の上限で抑えられている。
    pub fn height(&self) -> usize {
        let children = match &self.kind {
            ExprKind::Call { args, .. } => args.iter().map(Expression::height).max(),
            ExprKind::Block { statements } => statements.iter().map(Expression::height).max(),
            ExprKind::Parenthesized(inner) => Some(inner.height()),
            ExprKind::BinaryOp { left, right, .. } => Some(left.height().max(right.height())),
            ExprKind::Assign { value, .. } => Some(value.height()),
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => Some(
                condition
                    .height()
                    .max(then_branch.height())
                    .max(else_branch.as_ref().map_or(0, |e| e.height())),
            ),
            ExprKind::While { condition, body } => Some(condition.height().max(body.height())),
            ExprKind::For {
                start, finish, body, ..
            } => Some(start.height().max(finish.height()).max(body.height())),
            _ => None,
        };
        1 + children.unwrap_or(0)
    }

    /// 単項マイナスを書き換えた `(-1) * operand` の形なら、その被演算子を返す
    pub fn as_negation(&self) -> Option<&Expression> {
        match &self.kind {
            ExprKind::BinaryOp {
                op: Operator::Star,
                left,
                right,
                ..
            } if matches!(left.kind, ExprKind::IntLiteral(-1)) => Some(right),
            _ => None,
        }
    }
}

// 変数・引数・戻り値の型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Integer,
    Double,
    Void, // 値を返さない(手続き)
}

impl DataType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "integer" => Some(DataType::Integer),
            "double" => Some(DataType::Double),
            "void" => Some(DataType::Void),
            _ => None,
        }
    }
}

// エラーメッセージで型名を綺麗に表示するためのDisplay実装
impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DataType::Integer => write!(f, "integer"),
            DataType::Double => write!(f, "double"),
            DataType::Void => write!(f, "void"),
        }
    }
}

/// `const name = value;`
#[derive(Debug, PartialEq, Clone)]
pub struct ConstDecl {
    pub name: String,
    pub value: Expression,
    pub span: Span,
}

/// `var name: type;` の1つの名前。関数の引数にも使う。
#[derive(Debug, PartialEq, Clone)]
pub struct VarDecl {
    pub name: String,
    pub data_type: DataType,
    pub span: Span,
}

/// 関数・手続きの宣言
#[derive(Debug, PartialEq, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub return_type: DataType,
    pub params: Vec<VarDecl>,
    pub constants: Vec<ConstDecl>,
    pub variables: Vec<VarDecl>,
    /// `forward;` による前方宣言では `None`
    pub body: Option<Expression>,
    pub span: Span,
}

impl FunctionDecl {
    pub fn is_procedure(&self) -> bool {
        self.return_type == DataType::Void
    }

    pub fn is_forward(&self) -> bool {
        self.body.is_none()
    }
}

/// プログラム全体。構文木の根。
#[derive(Debug, PartialEq, Clone)]
pub struct Program {
    pub name: Option<String>,
    pub constants: Vec<ConstDecl>,
    pub variables: Vec<VarDecl>,
    pub functions: Vec<FunctionDecl>,
    pub body: Expression,
    pub span: Span,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    fn int(value: i64) -> Expression {
        Expression::new(ExprKind::IntLiteral(value), Span::default())
    }

    fn binary(op: Operator, left: Expression, right: Expression) -> Expression {
        Expression::new(
            ExprKind::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
                is_boolean: op.is_boolean(),
            },
            Span::default(),
        )
    }

    #[test]
    fn parentheses_forward_the_boolean_query() {
        let cmp = binary(Operator::Less, int(1), int(2));
        let wrapped = Expression::new(ExprKind::Parenthesized(Box::new(cmp)), Span::default());
        assert!(wrapped.is_boolean());
        assert!(wrapped.can_be_operand());
        assert!(!binary(Operator::Plus, int(1), int(2)).is_boolean());
    }

    #[test]
    fn statements_are_not_operands() {
        let block = Expression::new(ExprKind::Block { statements: Vec::new() }, Span::default());
        let assign = Expression::new(
            ExprKind::Assign {
                target: "x".to_string(),
                value: Box::new(int(1)),
            },
            Span::default(),
        );
        assert!(!block.can_be_operand());
        assert!(!assign.can_be_operand());
        assert!(!Expression::new(ExprKind::Break, Span::default()).can_be_operand());
    }

    #[test]
    fn height_counts_the_longest_path() {
        assert_eq!(int(1).height(), 1);
        let chain = binary(Operator::Plus, binary(Operator::Plus, int(1), int(2)), int(3));
        assert_eq!(chain.height(), 3);
        let wrapped = Expression::new(ExprKind::Parenthesized(Box::new(chain)), Span::default());
        assert_eq!(wrapped.height(), 4);
    }

    #[test]
    fn negation_shape_is_recognised() {
        let neg = binary(Operator::Star, int(-1), int(7));
        assert_eq!(neg.as_negation(), Some(&int(7)));
        assert_eq!(binary(Operator::Star, int(2), int(7)).as_negation(), None);
    }
}
