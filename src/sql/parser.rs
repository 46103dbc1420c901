//! Hand-written SQL parser.
//!
//! Statements are dispatched on a case-insensitive keyword prefix. SELECT
//! clauses are sliced between the first occurrences of their boundary
//! keywords; the boundary scanner is quote-aware, so a keyword inside a
//! string literal never terminates a clause.

use crate::error::{DbError, DbResult};
use crate::sql::ast::{
    AggFunc, AggregateExpr, CompareOp, JoinClause, JoinType, LogicOp, OrderBy, Predicate,
    SelectStatement, Statement,
};
use crate::types::{Column, DataType, FkAction, ForeignKey, Value};

pub fn parse_statement(input: &str) -> DbResult<Statement> {
    let mut sql = input.trim();
    if let Some(stripped) = sql.strip_suffix(';') {
        sql = stripped.trim_end();
    }
    if sql.is_empty() {
        return Err(DbError::Parse("empty SQL statement".into()));
    }
    let upper = sql.to_uppercase();
    if upper.starts_with("CREATE DATABASE") {
        parse_database_name(sql, "CREATE DATABASE").map(|name| Statement::CreateDatabase { name })
    } else if upper.starts_with("DROP DATABASE") {
        parse_database_name(sql, "DROP DATABASE").map(|name| Statement::DropDatabase { name })
    } else if upper == "SHOW DATABASES" {
        Ok(Statement::ShowDatabases)
    } else if upper == "SHOW TABLES" {
        Ok(Statement::ShowTables)
    } else if upper.starts_with("USE ") || upper == "USE" {
        parse_database_name(sql, "USE").map(|name| Statement::UseDatabase { name })
    } else if upper.starts_with("CREATE TABLE") {
        parse_create_table(sql)
    } else if upper.starts_with("CREATE INDEX") {
        parse_create_index(sql)
    } else if upper.starts_with("INSERT INTO") {
        parse_insert(sql)
    } else if upper.starts_with("SELECT") {
        parse_select(sql).map(Statement::Select)
    } else if upper.starts_with("UPDATE") {
        parse_update(sql)
    } else if upper.starts_with("DELETE FROM") {
        parse_delete(sql)
    } else {
        let head: String = sql.chars().take(40).collect();
        Err(DbError::Parse(format!("unsupported SQL statement: '{head}'")))
    }
}

fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn parse_database_name(sql: &str, prefix: &str) -> DbResult<String> {
    let rest = sql[prefix.len()..].trim();
    if !is_valid_identifier(rest) {
        return Err(DbError::Parse(format!(
            "{prefix} expects a single database name, got '{rest}'"
        )));
    }
    Ok(rest.to_string())
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}

/// First occurrence of `keyword` outside string literals, matched
/// case-insensitively on word boundaries.
fn find_keyword(sql: &str, keyword: &str) -> Option<usize> {
    let bytes = sql.as_bytes();
    let klen = keyword.len();
    let mut in_quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = in_quote {
            if b == q {
                in_quote = None;
            }
            i += 1;
            continue;
        }
        if b == b'\'' || b == b'"' {
            in_quote = Some(b);
            i += 1;
            continue;
        }
        if i + klen <= bytes.len() && sql[i..i + klen].eq_ignore_ascii_case(keyword) {
            let before_ok = i == 0 || !is_ident_byte(bytes[i - 1]);
            let after = i + klen;
            let after_ok = after == bytes.len() || !is_ident_byte(bytes[after]);
            if before_ok && after_ok {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

/// Splits on top-level commas, respecting quotes and parentheses.
fn split_commas(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quote: Option<char> = None;
    for c in text.chars() {
        match in_quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    in_quote = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    in_quote = Some(c);
                    current.push(c);
                }
                '(' => {
                    depth += 1;
                    current.push(c);
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    current.push(c);
                }
                ',' if depth == 0 => {
                    parts.push(current.trim().to_string());
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Interprets a literal token: quoted text, NULL, booleans, then numbers;
/// anything left over is bare text.
fn parse_literal(token: &str) -> Value {
    let t = token.trim();
    if t.len() >= 2 {
        let bytes = t.as_bytes();
        if (bytes[0] == b'\'' && bytes[t.len() - 1] == b'\'')
            || (bytes[0] == b'"' && bytes[t.len() - 1] == b'"')
        {
            return Value::Text(t[1..t.len() - 1].to_string());
        }
    }
    match t.to_uppercase().as_str() {
        "NULL" => return Value::Null,
        "TRUE" => return Value::Bool(true),
        "FALSE" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = t.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = t.parse::<f64>() {
        return Value::Float(f);
    }
    Value::Text(t.to_string())
}

fn parse_create_table(sql: &str) -> DbResult<Statement> {
    let rest = sql["CREATE TABLE".len()..].trim();
    let open = rest.find('(').ok_or_else(|| {
        DbError::Parse("CREATE TABLE requires a parenthesized column list".into())
    })?;
    let close = rest.rfind(')').ok_or_else(|| {
        DbError::Parse("unterminated column list in CREATE TABLE".into())
    })?;
    let table = rest[..open].trim();
    if !is_valid_identifier(table) {
        return Err(DbError::Parse(format!("invalid table name '{table}'")));
    }
    let mut columns = Vec::new();
    for def in split_commas(&rest[open + 1..close]) {
        columns.push(parse_column_def(&def)?);
    }
    if columns.is_empty() {
        return Err(DbError::Parse(format!(
            "table '{table}' must declare at least one column"
        )));
    }
    Ok(Statement::CreateTable {
        table: table.to_string(),
        columns,
    })
}

fn parse_column_def(def: &str) -> DbResult<Column> {
    let mut tokens = def.split_whitespace();
    let name = tokens
        .next()
        .ok_or_else(|| DbError::Parse(format!("invalid column definition: '{def}'")))?;
    if !is_valid_identifier(name) {
        return Err(DbError::Parse(format!("invalid column name '{name}'")));
    }
    let type_token = tokens
        .next()
        .ok_or_else(|| DbError::Parse(format!("column '{name}' is missing a data type")))?;
    let data_type = DataType::parse(type_token)
        .ok_or_else(|| DbError::Parse(format!("unsupported data type '{type_token}'")))?;
    let mut column = Column::new(name, data_type);
    // constraints are scanned only after the name and type tokens, so a
    // column named `unique_id` is not mistaken for a UNIQUE declaration
    let tail = def[name.len()..].trim_start();
    let tail = &tail[type_token.len()..];
    column.primary_key = find_keyword(tail, "PRIMARY KEY").is_some();
    column.unique = find_keyword(tail, "UNIQUE").is_some();
    column.not_null = column.primary_key || find_keyword(tail, "NOT NULL").is_some();
    if let Some(pos) = find_keyword(tail, "REFERENCES") {
        column.foreign_key = Some(parse_references(&tail[pos + "REFERENCES".len()..])?);
    }
    if find_keyword(tail, "VIRTUAL").is_some() || find_keyword(tail, "GENERATED").is_some() {
        column.generated = Some(parse_generated_expr(tail)?);
    }
    Ok(column)
}

fn parse_references(rest: &str) -> DbResult<ForeignKey> {
    let rest = rest.trim_start();
    let open = rest
        .find('(')
        .ok_or_else(|| DbError::Parse("REFERENCES requires table(column)".into()))?;
    let close = rest[open..]
        .find(')')
        .map(|c| open + c)
        .ok_or_else(|| DbError::Parse("REFERENCES requires table(column)".into()))?;
    let table = rest[..open].trim();
    let column = rest[open + 1..close].trim();
    if !is_valid_identifier(table) || !is_valid_identifier(column) {
        return Err(DbError::Parse(format!(
            "invalid REFERENCES target '{}'",
            rest.trim()
        )));
    }
    let on_delete = match find_keyword(rest, "ON DELETE") {
        Some(pos) => {
            let action = rest[pos + "ON DELETE".len()..].trim();
            let action_upper = action.to_uppercase();
            if action_upper.starts_with("SET NULL") {
                FkAction::SetNull
            } else if action_upper.starts_with("CASCADE") {
                FkAction::Cascade
            } else if action_upper.starts_with("RESTRICT") {
                FkAction::Restrict
            } else {
                return Err(DbError::Parse(format!(
                    "invalid ON DELETE action '{action}'"
                )));
            }
        }
        None => FkAction::Restrict,
    };
    Ok(ForeignKey {
        table: table.to_string(),
        column: column.to_string(),
        on_delete,
    })
}

/// Extracts the balanced-parenthesis expression of
/// `[GENERATED ALWAYS] AS (expr) VIRTUAL`.
fn parse_generated_expr(def: &str) -> DbResult<String> {
    let as_pos = find_keyword(def, "AS").ok_or_else(|| {
        DbError::Parse("generated column requires AS (expression) VIRTUAL".into())
    })?;
    let after = def[as_pos + 2..].trim_start();
    if !after.starts_with('(') {
        return Err(DbError::Parse(
            "generated column expression must be parenthesized".into(),
        ));
    }
    let mut depth = 0usize;
    for (i, c) in after.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let expr = after[1..i].trim();
                    let tail = after[i + 1..].trim();
                    if !tail.to_uppercase().starts_with("VIRTUAL") {
                        return Err(DbError::Parse(
                            "generated columns must be declared VIRTUAL".into(),
                        ));
                    }
                    return Ok(expr.to_string());
                }
            }
            _ => {}
        }
    }
    Err(DbError::Parse(
        "unbalanced parentheses in generated column expression".into(),
    ))
}

fn parse_create_index(sql: &str) -> DbResult<Statement> {
    let rest = sql["CREATE INDEX".len()..].trim();
    let on_pos = find_keyword(rest, "ON")
        .ok_or_else(|| DbError::Parse("CREATE INDEX requires ON table(columns)".into()))?;
    let name = rest[..on_pos].trim();
    let name = if name.is_empty() {
        None
    } else {
        if !is_valid_identifier(name) {
            return Err(DbError::Parse(format!("invalid index name '{name}'")));
        }
        Some(name.to_string())
    };
    let target = rest[on_pos + 2..].trim();
    let open = target
        .find('(')
        .ok_or_else(|| DbError::Parse("CREATE INDEX requires a column list".into()))?;
    let close = target
        .rfind(')')
        .ok_or_else(|| DbError::Parse("unterminated column list in CREATE INDEX".into()))?;
    let table = target[..open].trim();
    if !is_valid_identifier(table) {
        return Err(DbError::Parse(format!("invalid table name '{table}'")));
    }
    let columns: Vec<String> = split_commas(&target[open + 1..close])
        .into_iter()
        .map(|c| c.trim().to_string())
        .collect();
    if columns.is_empty() || columns.iter().any(|c| !is_valid_identifier(c)) {
        return Err(DbError::Parse(
            "CREATE INDEX requires at least one valid column".into(),
        ));
    }
    Ok(Statement::CreateIndex {
        name,
        table: table.to_string(),
        columns,
    })
}

fn parse_insert(sql: &str) -> DbResult<Statement> {
    let values_pos = find_keyword(sql, "VALUES")
        .ok_or_else(|| DbError::Parse("INSERT requires a VALUES clause".into()))?;
    let head = sql["INSERT INTO".len()..values_pos].trim();
    let (table, columns) = match head.find('(') {
        Some(open) => {
            let close = head
                .rfind(')')
                .ok_or_else(|| DbError::Parse("unterminated column list in INSERT".into()))?;
            let cols: Vec<String> = split_commas(&head[open + 1..close])
                .into_iter()
                .map(|c| c.trim().to_string())
                .collect();
            if cols.is_empty() {
                return Err(DbError::Parse("empty column list in INSERT".into()));
            }
            (head[..open].trim(), Some(cols))
        }
        None => (head, None),
    };
    if !is_valid_identifier(table) {
        return Err(DbError::Parse(format!("invalid table name '{table}'")));
    }
    let tail = sql[values_pos + "VALUES".len()..].trim();
    if !tail.starts_with('(') || !tail.ends_with(')') {
        return Err(DbError::Parse(
            "VALUES requires a parenthesized value list".into(),
        ));
    }
    let values: Vec<Value> = split_commas(&tail[1..tail.len() - 1])
        .iter()
        .map(|v| parse_literal(v))
        .collect();
    if values.is_empty() {
        return Err(DbError::Parse("VALUES list cannot be empty".into()));
    }
    Ok(Statement::Insert {
        table: table.to_string(),
        columns,
        values,
    })
}

/// Positions of every clause boundary that appears after `start`.
fn clause_end(sql: &str, start: usize, boundaries: &[Option<usize>]) -> usize {
    boundaries
        .iter()
        .flatten()
        .copied()
        .filter(|&p| p > start)
        .min()
        .unwrap_or(sql.len())
}

fn parse_select(sql: &str) -> DbResult<SelectStatement> {
    let from_pos = find_keyword(sql, "FROM")
        .ok_or_else(|| DbError::Parse("SELECT requires a FROM clause".into()))?;
    let where_pos = find_keyword(sql, "WHERE");
    let group_pos = find_keyword(sql, "GROUP BY");
    let having_pos = find_keyword(sql, "HAVING");
    let order_pos = find_keyword(sql, "ORDER BY");
    let limit_pos = find_keyword(sql, "LIMIT");
    let bounds = [where_pos, group_pos, having_pos, order_pos, limit_pos];

    let (columns, aggregates) = parse_select_list(sql["SELECT".len()..from_pos].trim())?;

    let from_clause = &sql[from_pos + "FROM".len()..clause_end(sql, from_pos, &bounds)];
    let (table, joins) = parse_from_clause(from_clause)?;

    let selection = match where_pos {
        Some(pos) => {
            let end = clause_end(sql, pos, &bounds);
            Some(parse_predicate(sql[pos + "WHERE".len()..end].trim())?)
        }
        None => None,
    };

    let group_by = match group_pos {
        Some(pos) => {
            let end = clause_end(sql, pos, &bounds);
            split_commas(sql[pos + "GROUP BY".len()..end].trim())
                .into_iter()
                .map(|c| c.trim().to_string())
                .collect()
        }
        None => Vec::new(),
    };

    let having = match having_pos {
        Some(pos) => {
            let end = clause_end(sql, pos, &bounds);
            Some(parse_predicate(sql[pos + "HAVING".len()..end].trim())?)
        }
        None => None,
    };

    let order_by = match order_pos {
        Some(pos) => {
            let end = clause_end(sql, pos, &bounds);
            Some(parse_order_by(sql[pos + "ORDER BY".len()..end].trim())?)
        }
        None => None,
    };

    let limit = match limit_pos {
        Some(pos) => {
            let text = sql[pos + "LIMIT".len()..].trim();
            Some(text.parse::<usize>().map_err(|_| {
                DbError::Parse(format!("LIMIT expects a non-negative integer, got '{text}'"))
            })?)
        }
        None => None,
    };

    if !group_by.is_empty() && aggregates.is_empty() {
        return Err(DbError::Parse(
            "GROUP BY requires at least one aggregate function".into(),
        ));
    }
    if having.is_some() && aggregates.is_empty() {
        return Err(DbError::Parse(
            "HAVING requires an aggregate query".into(),
        ));
    }

    Ok(SelectStatement {
        table,
        columns,
        aggregates,
        joins,
        selection,
        group_by,
        having,
        order_by,
        limit,
    })
}

fn parse_select_list(list: &str) -> DbResult<(Vec<String>, Vec<AggregateExpr>)> {
    if list.is_empty() {
        return Err(DbError::Parse("SELECT list cannot be empty".into()));
    }
    if list == "*" {
        return Ok((vec!["*".to_string()], Vec::new()));
    }
    let mut columns = Vec::new();
    let mut aggregates = Vec::new();
    for item in split_commas(list) {
        match parse_aggregate(&item)? {
            Some(agg) => aggregates.push(agg),
            None => columns.push(item),
        }
    }
    Ok((columns, aggregates))
}

fn parse_aggregate(item: &str) -> DbResult<Option<AggregateExpr>> {
    let open = match item.find('(') {
        Some(p) => p,
        None => return Ok(None),
    };
    let func = match item[..open].trim().to_uppercase().as_str() {
        "COUNT" => AggFunc::Count,
        "SUM" => AggFunc::Sum,
        "AVG" => AggFunc::Avg,
        "MAX" => AggFunc::Max,
        "MIN" => AggFunc::Min,
        _ => return Ok(None),
    };
    let close = item
        .rfind(')')
        .ok_or_else(|| DbError::Parse(format!("malformed aggregate '{item}'")))?;
    let mut arg = item[open + 1..close].trim().to_string();
    let mut distinct = false;
    if arg.to_uppercase().starts_with("DISTINCT ") {
        distinct = true;
        arg = arg["DISTINCT".len()..].trim().to_string();
    }
    if arg.is_empty() {
        return Err(DbError::Parse(format!("malformed aggregate '{item}'")));
    }
    if arg == "*" && func != AggFunc::Count {
        return Err(DbError::Parse(format!(
            "{}(*) is not supported; only COUNT accepts *",
            func.as_str()
        )));
    }
    let rest = item[close + 1..].trim();
    let alias = if rest.to_uppercase().starts_with("AS ") {
        rest["AS".len()..].trim().to_string()
    } else if rest.is_empty() {
        item.to_string()
    } else {
        return Err(DbError::Parse(format!(
            "unexpected trailing input after aggregate: '{rest}'"
        )));
    };
    let column = if arg == "*" { None } else { Some(arg) };
    Ok(Some(AggregateExpr {
        func,
        column,
        distinct,
        alias,
    }))
}

fn parse_from_clause(clause: &str) -> DbResult<(String, Vec<JoinClause>)> {
    let tokens: Vec<&str> = clause.split_whitespace().collect();
    let table = tokens
        .first()
        .ok_or_else(|| DbError::Parse("FROM requires a table name".into()))?;
    if !is_valid_identifier(table) {
        return Err(DbError::Parse(format!("invalid table name '{table}'")));
    }
    let mut joins = Vec::new();
    let mut i = 1;
    while i < tokens.len() {
        let upper = tokens[i].to_uppercase();
        let (join_type, consumed) = match upper.as_str() {
            "JOIN" => (JoinType::Inner, 1),
            "INNER" if tokens.get(i + 1).is_some_and(|t| t.eq_ignore_ascii_case("JOIN")) => {
                (JoinType::Inner, 2)
            }
            "LEFT" if tokens.get(i + 1).is_some_and(|t| t.eq_ignore_ascii_case("JOIN")) => {
                (JoinType::Left, 2)
            }
            _ => {
                return Err(DbError::Parse(format!(
                    "unexpected token '{}' in FROM clause",
                    tokens[i]
                )))
            }
        };
        i += consumed;
        let join_table = tokens
            .get(i)
            .ok_or_else(|| DbError::Parse("JOIN requires a table name".into()))?;
        i += 1;
        if !tokens.get(i).is_some_and(|t| t.eq_ignore_ascii_case("ON")) {
            return Err(DbError::Parse(format!(
                "JOIN {join_table} requires an ON condition"
            )));
        }
        i += 1;
        let mut condition = String::new();
        while i < tokens.len() {
            let u = tokens[i].to_uppercase();
            if u == "JOIN" || u == "INNER" || u == "LEFT" {
                break;
            }
            if !condition.is_empty() {
                condition.push(' ');
            }
            condition.push_str(tokens[i]);
            i += 1;
        }
        let (left, right) = condition
            .split_once('=')
            .map(|(l, r)| (l.trim().to_string(), r.trim().to_string()))
            .ok_or_else(|| {
                DbError::Parse(format!("unsupported JOIN condition '{condition}'"))
            })?;
        if left.is_empty() || right.is_empty() {
            return Err(DbError::Parse(format!(
                "unsupported JOIN condition '{condition}'"
            )));
        }
        joins.push(JoinClause {
            join_type,
            table: join_table.to_string(),
            left,
            right,
        });
    }
    Ok((table.to_string(), joins))
}

/// Parses a flat AND/OR chain of comparisons, left to right.
pub fn parse_predicate(text: &str) -> DbResult<Predicate> {
    let mut conditions = Vec::new();
    let mut operators = Vec::new();
    let mut rest = text.trim();
    loop {
        let and_pos = find_keyword(rest, "AND");
        let or_pos = find_keyword(rest, "OR");
        let split = match (and_pos, or_pos) {
            (Some(a), Some(o)) if a < o => Some((a, "AND".len(), LogicOp::And)),
            (Some(a), None) => Some((a, "AND".len(), LogicOp::And)),
            (_, Some(o)) => Some((o, "OR".len(), LogicOp::Or)),
            (None, None) => None,
        };
        match split {
            Some((pos, len, op)) => {
                conditions.push(parse_condition(rest[..pos].trim())?);
                operators.push(op);
                rest = rest[pos + len..].trim_start();
            }
            None => {
                conditions.push(parse_condition(rest.trim())?);
                break;
            }
        }
    }
    if conditions.len() == 1 {
        Ok(conditions.remove(0))
    } else {
        Ok(Predicate::Chain {
            conditions,
            operators,
        })
    }
}

/// Operators are scanned in a fixed order so `<=` is found before `<`.
const OPERATOR_SCAN: [(&str, CompareOp); 7] = [
    ("<=", CompareOp::LessOrEquals),
    (">=", CompareOp::GreaterOrEquals),
    ("!=", CompareOp::NotEquals),
    ("=", CompareOp::Equals),
    ("<", CompareOp::LessThan),
    (">", CompareOp::GreaterThan),
    ("LIKE", CompareOp::Like),
];

fn parse_condition(cond: &str) -> DbResult<Predicate> {
    for (symbol, op) in OPERATOR_SCAN {
        let pos = if symbol == "LIKE" {
            find_keyword(cond, symbol)
        } else {
            find_symbol(cond, symbol)
        };
        if let Some(pos) = pos {
            let column = cond[..pos].trim();
            let value_text = cond[pos + symbol.len()..].trim();
            if column.is_empty() || value_text.is_empty() {
                return Err(DbError::Parse(format!("malformed condition '{cond}'")));
            }
            return Ok(Predicate::Compare {
                column: column.to_string(),
                op,
                value: parse_literal(value_text),
            });
        }
    }
    Err(DbError::Parse(format!(
        "no comparison operator found in condition '{cond}'"
    )))
}

/// First occurrence of a symbolic operator outside string literals.
fn find_symbol(text: &str, symbol: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let slen = symbol.len();
    let mut in_quote: Option<u8> = None;
    let mut i = 0;
    while i + slen <= bytes.len() {
        let b = bytes[i];
        if let Some(q) = in_quote {
            if b == q {
                in_quote = None;
            }
            i += 1;
            continue;
        }
        if b == b'\'' || b == b'"' {
            in_quote = Some(b);
            i += 1;
            continue;
        }
        if &text[i..i + slen] == symbol {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn parse_order_by(clause: &str) -> DbResult<OrderBy> {
    let mut tokens = clause.split_whitespace();
    let column = tokens
        .next()
        .ok_or_else(|| DbError::Parse("ORDER BY requires a column".into()))?;
    let descending = match tokens.next() {
        None => false,
        Some(dir) if dir.eq_ignore_ascii_case("ASC") => false,
        Some(dir) if dir.eq_ignore_ascii_case("DESC") => true,
        Some(dir) => {
            return Err(DbError::Parse(format!(
                "invalid ORDER BY direction '{dir}'"
            )))
        }
    };
    if tokens.next().is_some() {
        return Err(DbError::Parse(
            "ORDER BY supports a single column".into(),
        ));
    }
    Ok(OrderBy {
        column: column.to_string(),
        descending,
    })
}

fn parse_update(sql: &str) -> DbResult<Statement> {
    let set_pos = find_keyword(sql, "SET")
        .ok_or_else(|| DbError::Parse("UPDATE requires a SET clause".into()))?;
    let table = sql["UPDATE".len()..set_pos].trim();
    if !is_valid_identifier(table) {
        return Err(DbError::Parse(format!("invalid table name '{table}'")));
    }
    let where_pos = find_keyword(sql, "WHERE");
    let set_end = where_pos.unwrap_or(sql.len());
    let mut assignments = Vec::new();
    for part in split_commas(sql[set_pos + "SET".len()..set_end].trim()) {
        let eq = find_symbol(&part, "=")
            .ok_or_else(|| DbError::Parse(format!("malformed assignment '{part}'")))?;
        let column = part[..eq].trim();
        let value_text = part[eq + 1..].trim();
        if column.is_empty() || value_text.is_empty() {
            return Err(DbError::Parse(format!("malformed assignment '{part}'")));
        }
        assignments.push((column.to_string(), parse_literal(value_text)));
    }
    if assignments.is_empty() {
        return Err(DbError::Parse("SET clause cannot be empty".into()));
    }
    let selection = match where_pos {
        Some(pos) => Some(parse_predicate(sql[pos + "WHERE".len()..].trim())?),
        None => None,
    };
    Ok(Statement::Update {
        table: table.to_string(),
        assignments,
        selection,
    })
}

fn parse_delete(sql: &str) -> DbResult<Statement> {
    let rest = sql["DELETE FROM".len()..].trim();
    let (table, selection) = match find_keyword(rest, "WHERE") {
        Some(pos) => (
            rest[..pos].trim(),
            Some(parse_predicate(rest[pos + "WHERE".len()..].trim())?),
        ),
        None => (rest, None),
    };
    if !is_valid_identifier(table) {
        return Err(DbError::Parse(format!("invalid table name '{table}'")));
    }
    Ok(Statement::Delete {
        table: table.to_string(),
        selection,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_table_with_constraints() {
        let stmt = parse_statement(
            "CREATE TABLE users (id INT PRIMARY KEY, email VARCHAR(100) UNIQUE NOT NULL, \
             dept_id INT REFERENCES departments(id) ON DELETE CASCADE)",
        )
        .unwrap();
        let Statement::CreateTable { table, columns } = stmt else {
            panic!("expected CREATE TABLE");
        };
        assert_eq!(table, "users");
        assert!(columns[0].primary_key && columns[0].not_null);
        assert!(columns[1].unique && columns[1].not_null);
        assert_eq!(columns[1].data_type, DataType::VarChar(Some(100)));
        let fk = columns[2].foreign_key.as_ref().unwrap();
        assert_eq!(fk.table, "departments");
        assert_eq!(fk.column, "id");
        assert_eq!(fk.on_delete, FkAction::Cascade);
    }

    #[test]
    fn constraint_keywords_inside_column_names_are_ignored() {
        let stmt = parse_statement(
            "CREATE TABLE t (unique_id INT, nonunique VARCHAR, primary_ref INT UNIQUE)",
        )
        .unwrap();
        let Statement::CreateTable { columns, .. } = stmt else {
            panic!("expected CREATE TABLE");
        };
        assert!(!columns[0].unique && !columns[0].primary_key && !columns[0].not_null);
        assert!(!columns[1].unique);
        assert!(columns[2].unique && !columns[2].primary_key);
    }

    #[test]
    fn generated_column_definition() {
        let stmt = parse_statement(
            "CREATE TABLE orders (id INT PRIMARY KEY, price FLOAT, qty INT, \
             total FLOAT GENERATED ALWAYS AS (price * qty) VIRTUAL)",
        )
        .unwrap();
        let Statement::CreateTable { columns, .. } = stmt else {
            panic!("expected CREATE TABLE");
        };
        assert_eq!(columns[3].generated.as_deref(), Some("price * qty"));
    }

    #[test]
    fn insert_literal_coercion() {
        let stmt =
            parse_statement("INSERT INTO t (a, b, c, d) VALUES (1, 2.5, 'x, y', NULL)").unwrap();
        let Statement::Insert {
            columns, values, ..
        } = stmt
        else {
            panic!("expected INSERT");
        };
        assert_eq!(columns.unwrap(), vec!["a", "b", "c", "d"]);
        assert_eq!(
            values,
            vec![
                Value::Int(1),
                Value::Float(2.5),
                Value::Text("x, y".into()),
                Value::Null
            ]
        );
    }

    #[test]
    fn select_clause_slicing() {
        let stmt = parse_statement(
            "SELECT name, SUM(total) AS spent FROM orders WHERE region = 'west' \
             GROUP BY name HAVING SUM(total) > 10 ORDER BY name DESC LIMIT 5",
        )
        .unwrap();
        let Statement::Select(sel) = stmt else {
            panic!("expected SELECT");
        };
        assert_eq!(sel.table, "orders");
        assert_eq!(sel.columns, vec!["name"]);
        assert_eq!(sel.aggregates[0].alias, "spent");
        assert_eq!(sel.group_by, vec!["name"]);
        assert!(sel.having.is_some());
        assert_eq!(
            sel.order_by,
            Some(OrderBy {
                column: "name".into(),
                descending: true
            })
        );
        assert_eq!(sel.limit, Some(5));
    }

    #[test]
    fn keywords_inside_literals_do_not_split_clauses() {
        let stmt =
            parse_statement("SELECT * FROM notes WHERE body = 'ORDER BY chaos LIMIT none'")
                .unwrap();
        let Statement::Select(sel) = stmt else {
            panic!("expected SELECT");
        };
        assert!(sel.order_by.is_none());
        assert!(sel.limit.is_none());
        assert_eq!(
            sel.selection,
            Some(Predicate::Compare {
                column: "body".into(),
                op: CompareOp::Equals,
                value: Value::Text("ORDER BY chaos LIMIT none".into()),
            })
        );
    }

    #[test]
    fn operator_scan_order() {
        let pred = parse_predicate("age >= 21 AND name LIKE 'A%' OR age != 3").unwrap();
        let Predicate::Chain {
            conditions,
            operators,
        } = pred
        else {
            panic!("expected chain");
        };
        assert_eq!(operators, vec![LogicOp::And, LogicOp::Or]);
        assert!(matches!(
            conditions[0],
            Predicate::Compare {
                op: CompareOp::GreaterOrEquals,
                ..
            }
        ));
        assert!(matches!(
            conditions[1],
            Predicate::Compare {
                op: CompareOp::Like,
                ..
            }
        ));
        assert!(matches!(
            conditions[2],
            Predicate::Compare {
                op: CompareOp::NotEquals,
                ..
            }
        ));
    }

    #[test]
    fn joins_in_from_clause() {
        let stmt = parse_statement(
            "SELECT * FROM users JOIN orders ON users.id = orders.user_id \
             LEFT JOIN payments ON orders.id = payments.order_id",
        )
        .unwrap();
        let Statement::Select(sel) = stmt else {
            panic!("expected SELECT");
        };
        assert_eq!(sel.joins.len(), 2);
        assert_eq!(sel.joins[0].join_type, JoinType::Inner);
        assert_eq!(sel.joins[0].left, "users.id");
        assert_eq!(sel.joins[1].join_type, JoinType::Left);
        assert_eq!(sel.joins[1].table, "payments");
    }

    #[test]
    fn count_distinct() {
        let stmt = parse_statement("SELECT COUNT(DISTINCT city) FROM users").unwrap();
        let Statement::Select(sel) = stmt else {
            panic!("expected SELECT");
        };
        assert!(sel.aggregates[0].distinct);
        assert_eq!(sel.aggregates[0].column.as_deref(), Some("city"));
    }

    #[test]
    fn create_index_variants() {
        let named = parse_statement("CREATE INDEX idx_name ON users (name)").unwrap();
        assert_eq!(
            named,
            Statement::CreateIndex {
                name: Some("idx_name".into()),
                table: "users".into(),
                columns: vec!["name".into()],
            }
        );
        let auto = parse_statement("CREATE INDEX ON users (city, name)").unwrap();
        assert_eq!(
            auto,
            Statement::CreateIndex {
                name: None,
                table: "users".into(),
                columns: vec!["city".into(), "name".into()],
            }
        );
    }

    #[test]
    fn unsupported_statement_errors() {
        assert!(parse_statement("GRANT ALL ON x TO y").is_err());
        assert!(parse_statement("").is_err());
        assert!(parse_statement("SELECT name").is_err());
    }
}
