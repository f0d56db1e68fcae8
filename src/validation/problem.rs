use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Information,
    Hint,
}

/// What a problem is about. Also drives how strongly a problem counts
/// against a `oneOf`/`anyOf` branch when picking the closest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProblemCode {
    Syntax,
    Type,
    Integer,
    Required,
    Enum,
    Const,
    Pattern,
    MinLength,
    MaxLength,
    Minimum,
    Maximum,
    ExclusiveMinimum,
    ExclusiveMaximum,
    MultipleOf,
    MinItems,
    MaxItems,
    AdditionalItems,
    MinProperties,
    MaxProperties,
    PropertyNotAllowed,
    DuplicateKey,
    NoBranchMatch,
    MultipleBranchMatch,
    Deprecated,
    Experimental,
    MaxDepth,
}

impl ProblemCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ProblemCode::Syntax => "syntax",
            ProblemCode::Type => "type",
            ProblemCode::Integer => "integer",
            ProblemCode::Required => "required",
            ProblemCode::Enum => "enum",
            ProblemCode::Const => "const",
            ProblemCode::Pattern => "pattern",
            ProblemCode::MinLength => "minLength",
            ProblemCode::MaxLength => "maxLength",
            ProblemCode::Minimum => "minimum",
            ProblemCode::Maximum => "maximum",
            ProblemCode::ExclusiveMinimum => "exclusiveMinimum",
            ProblemCode::ExclusiveMaximum => "exclusiveMaximum",
            ProblemCode::MultipleOf => "multipleOf",
            ProblemCode::MinItems => "minItems",
            ProblemCode::MaxItems => "maxItems",
            ProblemCode::AdditionalItems => "additionalItems",
            ProblemCode::MinProperties => "minProperties",
            ProblemCode::MaxProperties => "maxProperties",
            ProblemCode::PropertyNotAllowed => "propertyNotAllowed",
            ProblemCode::DuplicateKey => "duplicateKey",
            ProblemCode::NoBranchMatch => "noBranchMatch",
            ProblemCode::MultipleBranchMatch => "multipleBranchMatch",
            ProblemCode::Deprecated => "deprecated",
            ProblemCode::Experimental => "experimental",
            ProblemCode::MaxDepth => "maxDepth",
        }
    }

    pub fn weight(self) -> u32 {
        match self {
            ProblemCode::Type => 1000,
            ProblemCode::Integer => 900,
            ProblemCode::Required => 120,
            ProblemCode::Enum => 80,
            ProblemCode::Pattern
            | ProblemCode::Minimum
            | ProblemCode::Maximum
            | ProblemCode::ExclusiveMinimum
            | ProblemCode::ExclusiveMaximum
            | ProblemCode::MultipleOf => 60,
            ProblemCode::MinLength | ProblemCode::MaxLength => 40,
            _ => 50,
        }
    }
}

impl fmt::Display for ProblemCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A located problem. Offsets are bytes into the document text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidationProblem {
    pub start: usize,
    pub end: usize,
    pub message: String,
    pub severity: Severity,
    pub code: Option<ProblemCode>,
}

impl ValidationProblem {
    pub fn error(start: usize, end: usize, code: ProblemCode, message: impl Into<String>) -> Self {
        Self {
            start,
            end,
            message: message.into(),
            severity: Severity::Error,
            code: Some(code),
        }
    }

    pub fn warning(start: usize, end: usize, code: ProblemCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(start, end, code, message)
        }
    }

    pub fn weight(&self) -> u32 {
        self.code.map(ProblemCode::weight).unwrap_or(50)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Same problem moved by `delta` bytes (negative to make it relative).
    pub(crate) fn shifted(&self, delta: isize) -> Self {
        Self {
            start: self.start.saturating_add_signed(delta),
            end: self.end.saturating_add_signed(delta),
            ..self.clone()
        }
    }
}
