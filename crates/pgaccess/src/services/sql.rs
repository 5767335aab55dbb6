//! Statement text for the CRUD operations.
//!
//! Everything here is pure string building; nothing touches the network.

use crate::error::{DbError, DbResult};
use crate::models::{Filter, Record, Updates};

/// Quote an identifier, keeping `schema.table` qualification.
pub fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

fn column_list(columns: &[&str]) -> String {
    columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
}

/// Rewrite `?` placeholders to `$n`, numbering from `first`.
///
/// A `?` is left alone inside quoted literals (including `E'…'` backslash
/// escapes and `$tag$…$tag$` bodies), double-quoted identifiers, and `--` or
/// `/* */` comments. `??` becomes a literal `?`.
pub fn bind_placeholders(clause: &str, first: usize) -> String {
    let chars: Vec<char> = clause.chars().collect();
    let mut out = String::with_capacity(clause.len() + 8);
    let mut next = first;
    let mut i = 0;

    while i < chars.len() {
        let skip_to = match chars[i] {
            '\'' => {
                let escapes = i > 0
                    && matches!(chars[i - 1], 'e' | 'E')
                    && (i < 2 || !is_ident_char(chars[i - 2]));
                Some(quoted_end(&chars, i, '\'', escapes))
            }
            '"' => Some(quoted_end(&chars, i, '"', false)),
            '-' if chars.get(i + 1) == Some(&'-') => Some(
                chars[i..].iter().position(|&c| c == '\n').map_or(chars.len(), |n| i + n),
            ),
            '/' if chars.get(i + 1) == Some(&'*') => Some(block_comment_end(&chars, i)),
            '$' if i == 0 || !is_ident_char(chars[i - 1]) => dollar_quote_end(&chars, i),
            '?' => {
                if chars.get(i + 1) == Some(&'?') {
                    out.push('?');
                    i += 2;
                } else {
                    out.push('$');
                    out.push_str(&next.to_string());
                    next += 1;
                    i += 1;
                }
                continue;
            }
            _ => None,
        };

        match skip_to {
            Some(end) => {
                out.extend(&chars[i..end]);
                i = end;
            }
            None => {
                out.push(chars[i]);
                i += 1;
            }
        }
    }

    out
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// End (exclusive) of the quoted run opening at `start`. Doubled quotes stay
/// inside; an unterminated run extends to the end.
fn quoted_end(chars: &[char], start: usize, quote: char, backslash_escapes: bool) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        if backslash_escapes && chars[i] == '\\' {
            i += 2;
            continue;
        }
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

/// End (exclusive) of the block comment opening at `start`. Comments nest.
fn block_comment_end(chars: &[char], start: usize) -> usize {
    let mut depth = 0;
    let mut i = start;
    while i + 1 < chars.len() {
        match (chars[i], chars[i + 1]) {
            ('/', '*') => {
                depth += 1;
                i += 2;
            }
            ('*', '/') => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return i;
                }
            }
            _ => i += 1,
        }
    }
    chars.len()
}

/// End (exclusive) of the `$tag$…$tag$` body opening at `start`, or `None`
/// when the `$` does not open one (`$1` is a positional parameter).
fn dollar_quote_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if chars.get(j).is_some_and(|&c| c.is_alphabetic() || c == '_') {
        while chars.get(j).is_some_and(|&c| is_ident_char(c)) {
            j += 1;
        }
    }
    if chars.get(j) != Some(&'$') {
        return None;
    }

    let tag = &chars[start..=j];
    let body = j + 1;
    let close = chars[body..].windows(tag.len()).position(|w| w == tag);
    Some(close.map_or(chars.len(), |n| body + n + tag.len()))
}

fn where_clause(filter: &Filter, first: usize) -> String {
    if filter.is_all() {
        String::new()
    } else {
        format!(" WHERE ({})", bind_placeholders(filter.clause(), first))
    }
}

fn require_condition<M: Record>(filter: &Filter, verb: &str) -> DbResult<()> {
    if filter.is_all() {
        return Err(DbError::invalid_query(format!(
            "{verb} on {} without a WHERE clause",
            M::TABLE
        )));
    }
    Ok(())
}

/// `SELECT cols FROM table [WHERE …]`, optionally limited to the first row
/// by primary key.
pub fn select<M: Record>(filter: &Filter, first_only: bool) -> String {
    let mut sql = format!(
        "SELECT {} FROM {}{}",
        column_list(M::COLUMNS),
        quote_ident(M::TABLE),
        where_clause(filter, 1)
    );
    if first_only {
        sql.push_str(&format!(" ORDER BY {} LIMIT 1", quote_ident(M::PRIMARY_KEY)));
    }
    sql
}

/// `INSERT … RETURNING cols`.
pub fn insert<M: Record>() -> String {
    let returning = column_list(M::COLUMNS);
    if M::INSERT_COLUMNS.is_empty() {
        return format!(
            "INSERT INTO {} DEFAULT VALUES RETURNING {returning}",
            quote_ident(M::TABLE)
        );
    }

    let placeholders = (1..=M::INSERT_COLUMNS.len())
        .map(|n| format!("${n}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({placeholders}) RETURNING {returning}",
        quote_ident(M::TABLE),
        column_list(M::INSERT_COLUMNS)
    )
}

/// `UPDATE table SET … WHERE …`. Assignment values bind first.
pub fn update<M: Record>(filter: &Filter, updates: &Updates) -> DbResult<String> {
    require_condition::<M>(filter, "UPDATE")?;
    if updates.is_empty() {
        return Err(DbError::invalid_query(format!("UPDATE on {} with no columns", M::TABLE)));
    }

    let assignments = updates
        .columns()
        .enumerate()
        .map(|(i, column)| format!("{} = ${}", quote_ident(column), i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!(
        "UPDATE {} SET {assignments}{}",
        quote_ident(M::TABLE),
        where_clause(filter, updates.len() + 1)
    ))
}

/// `DELETE FROM table WHERE …`.
pub fn delete<M: Record>(filter: &Filter) -> DbResult<String> {
    require_condition::<M>(filter, "DELETE")?;
    Ok(format!("DELETE FROM {}{}", quote_ident(M::TABLE), where_clause(filter, 1)))
}

/// Delete the first matching row by primary key in one statement.
///
/// The subquery locks the row it picks, so a concurrent delete of that row
/// makes this statement match nothing instead of removing another row.
pub fn delete_one<M: Record>(filter: &Filter) -> String {
    let table = quote_ident(M::TABLE);
    let pk = quote_ident(M::PRIMARY_KEY);
    format!(
        "DELETE FROM {table} WHERE {pk} = (SELECT {pk} FROM {table}{} ORDER BY {pk} LIMIT 1 \
         FOR UPDATE) RETURNING {}",
        where_clause(filter, 1),
        column_list(M::COLUMNS)
    )
}

/// `SELECT COUNT(*) FROM table [WHERE …]`.
pub fn count<M: Record>(filter: &Filter) -> String {
    format!("SELECT COUNT(*) FROM {}{}", quote_ident(M::TABLE), where_clause(filter, 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Account, Widget};

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("billing.invoices"), "\"billing\".\"invoices\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_bind_placeholders() {
        assert_eq!(bind_placeholders("a = ? AND b > ?", 1), "a = $1 AND b > $2");
        assert_eq!(bind_placeholders("a = ?", 3), "a = $3");
        assert_eq!(bind_placeholders("note = '?' AND a = ?", 1), "note = '?' AND a = $1");
        assert_eq!(bind_placeholders("\"odd?\" = ?", 1), "\"odd?\" = $1");
        assert_eq!(bind_placeholders("tags ?? 'x' AND id = ?", 1), "tags ? 'x' AND id = $1");
        assert_eq!(bind_placeholders("name = 'it''s' OR name = ?", 1), "name = 'it''s' OR name = $1");
        assert_eq!(bind_placeholders("path = 'C:\\' OR id = ?", 1), "path = 'C:\\' OR id = $1");
    }

    #[test]
    fn test_bind_placeholders_skips_escape_and_dollar_strings() {
        assert_eq!(
            bind_placeholders("body = $$it's$$ OR id = ?", 1),
            "body = $$it's$$ OR id = $1"
        );
        assert_eq!(
            bind_placeholders("body = $fn$ what? $$ $fn$ AND id = ?", 2),
            "body = $fn$ what? $$ $fn$ AND id = $2"
        );
        assert_eq!(
            bind_placeholders("note = E'a\\'b?' OR id = ?", 1),
            "note = E'a\\'b?' OR id = $1"
        );
        assert_eq!(bind_placeholders("id = $1 OR id = ?", 2), "id = $1 OR id = $2");
    }

    #[test]
    fn test_bind_placeholders_skips_comments() {
        assert_eq!(
            bind_placeholders("id = ? -- what?\n AND x = ?", 1),
            "id = $1 -- what?\n AND x = $2"
        );
        assert_eq!(
            bind_placeholders("/* why? /* nested? */ */ id = ?", 1),
            "/* why? /* nested? */ */ id = $1"
        );
        assert_eq!(bind_placeholders("a = ? -- trailing?", 1), "a = $1 -- trailing?");
    }

    #[test]
    fn test_select() {
        let filter = Filter::new("quantity > ?").bind(5_i32);
        assert_eq!(
            select::<Widget>(&filter, false),
            "SELECT \"id\", \"name\", \"quantity\" FROM \"widgets\" WHERE (quantity > $1)"
        );
        assert_eq!(
            select::<Widget>(&Filter::all(), true),
            "SELECT \"id\", \"name\", \"quantity\" FROM \"widgets\" ORDER BY \"id\" LIMIT 1"
        );
    }

    #[test]
    fn test_insert() {
        assert_eq!(
            insert::<Widget>(),
            "INSERT INTO \"widgets\" (\"name\", \"quantity\") VALUES ($1, $2) \
             RETURNING \"id\", \"name\", \"quantity\""
        );
        assert_eq!(
            insert::<Account>(),
            "INSERT INTO \"ledger\".\"accounts\" DEFAULT VALUES RETURNING \"account_no\""
        );
    }

    #[test]
    fn test_update_numbers_filter_after_assignments() {
        let filter = Filter::new("id = ?").bind(7_i64);
        let updates = Updates::new().set("name", "bolt").set("quantity", 3_i32);
        assert_eq!(
            update::<Widget>(&filter, &updates).unwrap(),
            "UPDATE \"widgets\" SET \"name\" = $1, \"quantity\" = $2 WHERE (id = $3)"
        );
    }

    #[test]
    fn test_update_rejects_empty_input() {
        let updates = Updates::new().set("name", "bolt");
        let err = update::<Widget>(&Filter::all(), &updates).unwrap_err();
        assert!(matches!(err, DbError::InvalidQuery { .. }));

        let err = update::<Widget>(&Filter::new("id = ?").bind(1_i64), &Updates::new()).unwrap_err();
        assert!(matches!(err, DbError::InvalidQuery { .. }));
    }

    #[test]
    fn test_delete_requires_condition() {
        assert!(delete::<Widget>(&Filter::all()).is_err());
        assert_eq!(
            delete::<Widget>(&Filter::new("TRUE")).unwrap(),
            "DELETE FROM \"widgets\" WHERE (TRUE)"
        );
    }

    #[test]
    fn test_delete_one_is_a_single_statement() {
        let filter = Filter::new("name = ?").bind("bolt");
        assert_eq!(
            delete_one::<Widget>(&filter),
            "DELETE FROM \"widgets\" WHERE \"id\" = (SELECT \"id\" FROM \"widgets\" \
             WHERE (name = $1) ORDER BY \"id\" LIMIT 1 FOR UPDATE) \
             RETURNING \"id\", \"name\", \"quantity\""
        );
    }

    #[test]
    fn test_count_uses_custom_primary_key_table() {
        assert_eq!(
            count::<Account>(&Filter::all()),
            "SELECT COUNT(*) FROM \"ledger\".\"accounts\""
        );
        let filter = Filter::new("account_no = ?").bind(1_i64);
        assert!(delete_one::<Account>(&filter).contains("ORDER BY \"account_no\""));
    }
}
