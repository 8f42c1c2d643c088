//! The operator set of the language.

use bitflags::bitflags;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    Assign,
    PlusAssign,
    MinusAssign,
    MultiplyAssign,
    DivideAssign,
    ModulusAssign,
    BitwiseNot,
    ShiftLeft,
    ShiftRight,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    ShiftLeftAssign,
    ShiftRightAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    LogicalAnd,
    LogicalOr,
    LessThan,
    GreaterThan,
    Equal,
    NotEqual,
    LessThanOrEqual,
    GreaterThanOrEqual,
    Increment,
    Decrement,
    LogicalNot,
    MemberAccess,
    Cast,
}

bitflags! {
    /// Category flags used by the type checker to pick a checking rule.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct OperatorFlags: u16 {
        const ARITHMETIC = 1 << 0;
        const COMPARISON = 1 << 1;
        const LOGICAL    = 1 << 2;
        const BITWISE    = 1 << 3;
        const SHIFT      = 1 << 4;
        const ASSIGNMENT = 1 << 5;
        const UNARY      = 1 << 6;
        const MUTATING   = 1 << 7;
    }
}

impl Operator {
    pub fn flags(self) -> OperatorFlags {
        use Operator::*;
        match self {
            Add | Subtract | Multiply | Divide | Modulus => OperatorFlags::ARITHMETIC,
            LessThan | GreaterThan | Equal | NotEqual | LessThanOrEqual | GreaterThanOrEqual => {
                OperatorFlags::COMPARISON
            }
            LogicalAnd | LogicalOr => OperatorFlags::LOGICAL,
            BitwiseAnd | BitwiseOr | BitwiseXor => OperatorFlags::BITWISE,
            ShiftLeft | ShiftRight => OperatorFlags::SHIFT,
            Assign => OperatorFlags::ASSIGNMENT,
            PlusAssign | MinusAssign | MultiplyAssign | DivideAssign | ModulusAssign => {
                OperatorFlags::ASSIGNMENT | OperatorFlags::ARITHMETIC
            }
            ShiftLeftAssign | ShiftRightAssign => OperatorFlags::ASSIGNMENT | OperatorFlags::SHIFT,
            AndAssign | OrAssign | XorAssign => OperatorFlags::ASSIGNMENT | OperatorFlags::BITWISE,
            BitwiseNot => OperatorFlags::UNARY | OperatorFlags::BITWISE,
            LogicalNot => OperatorFlags::UNARY | OperatorFlags::LOGICAL,
            Increment | Decrement => OperatorFlags::UNARY | OperatorFlags::MUTATING,
            MemberAccess | Cast => OperatorFlags::empty(),
        }
    }

    pub fn is_comparison(self) -> bool {
        self.flags().contains(OperatorFlags::COMPARISON)
    }

    pub fn is_assignment(self) -> bool {
        self.flags().contains(OperatorFlags::ASSIGNMENT)
    }

    /// The arithmetic core of a compound assignment (`+=` → `+`).
    pub fn without_assignment(self) -> Option<Operator> {
        use Operator::*;
        Some(match self {
            PlusAssign => Add,
            MinusAssign => Subtract,
            MultiplyAssign => Multiply,
            DivideAssign => Divide,
            ModulusAssign => Modulus,
            ShiftLeftAssign => ShiftLeft,
            ShiftRightAssign => ShiftRight,
            AndAssign => BitwiseAnd,
            OrAssign => BitwiseOr,
            XorAssign => BitwiseXor,
            _ => return None,
        })
    }

    /// Stable numeric code used by the assembly codec.
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Operator> {
        use Operator::*;
        const ALL: &[Operator] = &[
            Add,
            Subtract,
            Multiply,
            Divide,
            Modulus,
            Assign,
            PlusAssign,
            MinusAssign,
            MultiplyAssign,
            DivideAssign,
            ModulusAssign,
            BitwiseNot,
            ShiftLeft,
            ShiftRight,
            BitwiseAnd,
            BitwiseOr,
            BitwiseXor,
            ShiftLeftAssign,
            ShiftRightAssign,
            AndAssign,
            OrAssign,
            XorAssign,
            LogicalAnd,
            LogicalOr,
            LessThan,
            GreaterThan,
            Equal,
            NotEqual,
            LessThanOrEqual,
            GreaterThanOrEqual,
            Increment,
            Decrement,
            LogicalNot,
            MemberAccess,
            Cast,
        ];
        ALL.get(code as usize).copied()
    }

    /// Unique single-character code used in overload-signature rendering.
    pub fn lookup_char(self) -> char {
        use Operator::*;
        match self {
            Add => '+',
            Subtract => '-',
            Multiply => '*',
            Divide => '/',
            Modulus => '%',
            Assign => '=',
            PlusAssign => 'p',
            MinusAssign => 'm',
            MultiplyAssign => 'u',
            DivideAssign => 'v',
            ModulusAssign => 'w',
            BitwiseNot => '~',
            ShiftLeft => 'l',
            ShiftRight => 'r',
            BitwiseAnd => '&',
            BitwiseOr => '|',
            BitwiseXor => '^',
            ShiftLeftAssign => 'j',
            ShiftRightAssign => 'k',
            AndAssign => 'x',
            OrAssign => 'y',
            XorAssign => 'z',
            LogicalAnd => 'a',
            LogicalOr => 'o',
            LessThan => '<',
            GreaterThan => '>',
            Equal => 'E',
            NotEqual => 'N',
            LessThanOrEqual => 'L',
            GreaterThanOrEqual => 'G',
            Increment => 'I',
            Decrement => 'D',
            LogicalNot => '!',
            MemberAccess => '.',
            Cast => '#',
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Operator::*;
        let text = match self {
            Add => "+",
            Subtract => "-",
            Multiply => "*",
            Divide => "/",
            Modulus => "%",
            Assign => "=",
            PlusAssign => "+=",
            MinusAssign => "-=",
            MultiplyAssign => "*=",
            DivideAssign => "/=",
            ModulusAssign => "%=",
            BitwiseNot => "~",
            ShiftLeft => "<<",
            ShiftRight => ">>",
            BitwiseAnd => "&",
            BitwiseOr => "|",
            BitwiseXor => "^",
            ShiftLeftAssign => "<<=",
            ShiftRightAssign => ">>=",
            AndAssign => "&=",
            OrAssign => "|=",
            XorAssign => "^=",
            LogicalAnd => "&&",
            LogicalOr => "||",
            LessThan => "<",
            GreaterThan => ">",
            Equal => "==",
            NotEqual => "!=",
            LessThanOrEqual => "<=",
            GreaterThanOrEqual => ">=",
            Increment => "++",
            Decrement => "--",
            LogicalNot => "!",
            MemberAccess => ".",
            Cast => "cast",
        };
        f.write_str(text)
    }
}
