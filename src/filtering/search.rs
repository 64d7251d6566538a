use sea_orm::{
    ColumnTrait, Condition,
    sea_query::{Expr, Func, LikeExpr},
};

// Basic safety limits
pub const MAX_SEARCH_QUERY_LENGTH: usize = 10_000;

/// Escape LIKE wildcards so a search term only ever matches literally.
/// Escapes `\` first, then `%` and `_`.
#[must_use]
pub fn escape_like_wildcards(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Trim a term and cap it at [`MAX_SEARCH_QUERY_LENGTH`] bytes without splitting a character.
fn sanitize_term(term: &str) -> &str {
    let mut end = term.len().min(MAX_SEARCH_QUERY_LENGTH);
    while !term.is_char_boundary(end) {
        end -= 1;
    }
    term[..end].trim()
}

/// Case-insensitive substring search across `columns`, OR-ed together:
/// `UPPER(col) LIKE '%TERM%' ESCAPE '\'`.
///
/// Returns `None` for a blank term or when there is nothing to search.
#[must_use]
pub fn build_search_condition<C: ColumnTrait>(term: &str, columns: &[(&str, C)]) -> Option<Condition> {
    let term = sanitize_term(term);
    if term.is_empty() || columns.is_empty() {
        return None;
    }

    let pattern = format!("%{}%", escape_like_wildcards(term).to_uppercase());
    let condition = columns.iter().fold(Condition::any(), |cond, (_, column)| {
        cond.add(
            Expr::expr(Func::upper(Expr::col((column.entity_name(), *column))))
                .like(LikeExpr::new(pattern.clone()).escape('\\')),
        )
    });
    Some(condition)
}
