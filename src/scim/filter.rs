//! Equality filter parsing.
//!
//! Only a single clause of the form `<attribute> eq "<value>"` is understood.
//! Anything else, including `and`/`or` combinations, is rejected outright
//! rather than partially interpreted.
//!
//! Which attributes a route accepts, and which adapter lookup each attribute
//! resolves to, is kept in a per-route rule table ([`USER_FILTERS`],
//! [`GROUP_FILTERS`]).
//!
//! ```text
//! userName eq "bjensen"
//! id eq "bjensen"
//! members.value eq "bjensen"
//! displayName eq "Admins"
//! ```

/// Maximum allowed length of a filter expression (bytes).
pub const MAX_FILTER_LENGTH: usize = 4096;

/// The only supported comparison operator. Matched case-sensitively.
const EQ: &str = "eq";

/// A parsed `<attribute> eq "<value>"` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqualityFilter {
    pub attribute: String,
    pub value: String,
}

/// Why a filter was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterSyntaxError {
    #[error("filter is empty")]
    Empty,

    #[error("filter exceeds maximum length ({0} bytes, max {MAX_FILTER_LENGTH})")]
    TooLong(usize),

    #[error(
        "filter must be a single clause <attribute> eq \"<value>\", found {0} tokens"
    )]
    TokenCount(usize),

    #[error("unsupported filter operator \"{0}\", only \"eq\" is supported")]
    Operator(String),

    #[error("filter value {0} must be a double-quoted string")]
    Value(String),

    #[error("filter attribute \"{attribute}\" is not supported here, expected one of: {allowed}")]
    Attribute { attribute: String, allowed: String },
}

/// Parse a single equality clause without restricting the attribute.
pub fn parse_equality(input: &str) -> Result<EqualityFilter, FilterSyntaxError> {
    if input.len() > MAX_FILTER_LENGTH {
        return Err(FilterSyntaxError::TooLong(input.len()));
    }

    let tokens: Vec<&str> = input.split_ascii_whitespace().collect();
    let [attribute, operator, value] = tokens.as_slice() else {
        return Err(if tokens.is_empty() {
            FilterSyntaxError::Empty
        } else {
            FilterSyntaxError::TokenCount(tokens.len())
        });
    };

    if *operator != EQ {
        return Err(FilterSyntaxError::Operator(operator.to_string()));
    }

    let unquoted = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .filter(|v| !v.is_empty() && !v.contains('"'))
        .ok_or_else(|| FilterSyntaxError::Value(value.to_string()))?;

    Ok(EqualityFilter {
        attribute: attribute.to_string(),
        value: unquoted.to_string(),
    })
}

// =============================================================================
// Per-route rule tables
// =============================================================================

/// Adapter lookup selected by a filter attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOp {
    GetUser,
    GetGroup,
    GetGroupMembers,
}

/// Maps one accepted filter attribute to the lookup it triggers.
#[derive(Debug, Clone, Copy)]
pub struct FilterRule {
    pub attribute: &'static str,
    pub op: LookupOp,
}

/// Filters accepted on `GET /Users`.
pub const USER_FILTERS: &[FilterRule] = &[
    FilterRule {
        attribute: "userName",
        op: LookupOp::GetUser,
    },
    FilterRule {
        attribute: "id",
        op: LookupOp::GetUser,
    },
];

/// Filters accepted on `GET /Groups`.
pub const GROUP_FILTERS: &[FilterRule] = &[
    FilterRule {
        attribute: "members.value",
        op: LookupOp::GetGroupMembers,
    },
    FilterRule {
        attribute: "displayName",
        op: LookupOp::GetGroup,
    },
];

/// Parse a filter and resolve it against a route's rule table.
pub fn parse_lookup(
    input: &str,
    rules: &[FilterRule],
) -> Result<(LookupOp, EqualityFilter), FilterSyntaxError> {
    let filter = parse_equality(input)?;
    let rule = rules
        .iter()
        .find(|rule| rule.attribute == filter.attribute)
        .ok_or_else(|| FilterSyntaxError::Attribute {
            attribute: filter.attribute.clone(),
            allowed: rules
                .iter()
                .map(|rule| rule.attribute)
                .collect::<Vec<_>>()
                .join(", "),
        })?;

    Ok((rule.op, filter))
}
