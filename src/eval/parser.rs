//! Script parser
//!
//! Builds an [`Expr`] tree from script text using the PEG grammar in
//! `script.pest`.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use super::error::{ScriptError, ScriptResult};

#[derive(Parser)]
#[grammar = "eval/script.pest"]
struct ScriptParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Parsed script expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    None,
    Name(String),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    ListComp {
        element: Box<Expr>,
        targets: Vec<String>,
        iter: Box<Expr>,
        condition: Option<Box<Expr>>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Chained comparison: `a < b <= c`
    Compare {
        first: Box<Expr>,
        rest: Vec<(CmpOp, Expr)>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        target: Box<Expr>,
        start: Option<Box<Expr>>,
        end: Option<Box<Expr>>,
    },
    Attribute {
        target: Box<Expr>,
        name: String,
    },
}

/// Tallest expression tree a script may build.
///
/// Counts every node level: lists, tuples, prefix operators, calls and each
/// link of an operator chain such as `a + b + c`. Plain parentheses are free.
pub const MAX_NESTING: usize = 256;

/// Parse script text into an expression tree.
pub fn parse_script(source: &str) -> ScriptResult<Expr> {
    let mut pairs = ScriptParser::parse(Rule::script, source).map_err(syntax_error)?;
    let script = pairs.next().ok_or_else(empty_script)?;
    let expr = script
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .ok_or_else(empty_script)?;
    Ok(build(expr, 0)?.expr)
}

fn empty_script() -> ScriptError {
    ScriptError::Syntax {
        message: "empty script".to_string(),
        line: 1,
        column: 1,
    }
}

fn syntax_error(err: pest::error::Error<Rule>) -> ScriptError {
    let (line, column) = match err.line_col {
        pest::error::LineColLocation::Pos(pos) => pos,
        pest::error::LineColLocation::Span(start, _) => start,
    };
    let message = match &err.variant {
        pest::error::ErrorVariant::ParsingError { positives, .. } if !positives.is_empty() => {
            let expected: Vec<String> = positives.iter().map(|r| format!("{r:?}")).collect();
            format!("expected {}", expected.join(", "))
        }
        pest::error::ErrorVariant::CustomError { message } => message.clone(),
        _ => "invalid syntax".to_string(),
    };
    ScriptError::Syntax {
        message,
        line,
        column,
    }
}

fn too_deep((line, column): (usize, usize)) -> ScriptError {
    ScriptError::Syntax {
        message: format!("expression nested deeper than {MAX_NESTING} levels"),
        line,
        column,
    }
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_and
            | Rule::kw_or
            | Rule::kw_not
            | Rule::kw_if
            | Rule::kw_else
            | Rule::kw_for
            | Rule::kw_in
    )
}

/// Inner pairs without keyword tokens
fn significant(pair: Pair<'_, Rule>) -> impl Iterator<Item = Pair<'_, Rule>> {
    pair.into_inner().filter(|p| !is_keyword(p.as_rule()))
}

fn malformed(rule: Rule) -> ScriptError {
    ScriptError::Syntax {
        message: format!("malformed {rule:?}"),
        line: 0,
        column: 0,
    }
}

/// An expression with the height of its tree.
struct Node {
    expr: Expr,
    height: usize,
}

impl Node {
    fn leaf(expr: Expr) -> Self {
        Node { expr, height: 1 }
    }

    /// `expr` sits one level above its tallest child.
    fn over(children: usize, expr: Expr, at: (usize, usize)) -> ScriptResult<Self> {
        let height = children + 1;
        if height > MAX_NESTING {
            return Err(too_deep(at));
        }
        Ok(Node { expr, height })
    }

    fn boxed(self) -> Box<Expr> {
        Box::new(self.expr)
    }
}

fn tallest(nodes: &[Node]) -> usize {
    nodes.iter().map(|n| n.height).max().unwrap_or(0)
}

fn exprs(nodes: Vec<Node>) -> Vec<Expr> {
    nodes.into_iter().map(|n| n.expr).collect()
}

/// Skips precedence levels that wrap a single child, so the builder only
/// recurses where the tree actually grows.
fn unwrap_levels(mut pair: Pair<'_, Rule>) -> Pair<'_, Rule> {
    loop {
        let wraps = matches!(
            pair.as_rule(),
            Rule::expr
                | Rule::disjunction
                | Rule::conjunction
                | Rule::inversion
                | Rule::comparison
                | Rule::sum
                | Rule::term
                | Rule::factor
                | Rule::power
                | Rule::postfix
                | Rule::paren
        );
        if !wraps {
            return pair;
        }
        let mut inner = pair.clone().into_inner();
        match (inner.next(), inner.next()) {
            (Some(only), None) => pair = only,
            _ => return pair,
        }
    }
}

fn next_node<'a>(
    inner: &mut impl Iterator<Item = Pair<'a, Rule>>,
    rule: Rule,
    depth: usize,
) -> ScriptResult<Node> {
    let pair = inner.next().ok_or_else(|| malformed(rule))?;
    build(pair, depth)
}

fn build(pair: Pair<'_, Rule>, depth: usize) -> ScriptResult<Node> {
    let pair = unwrap_levels(pair);
    let at = pair.line_col();
    if depth >= MAX_NESTING {
        return Err(too_deep(at));
    }
    let depth = depth + 1;
    let rule = pair.as_rule();
    match rule {
        Rule::expr => {
            let mut inner = significant(pair);
            let value = next_node(&mut inner, rule, depth)?;
            let Some(tail) = inner.next() else {
                return Ok(value);
            };
            let mut tail = significant(tail);
            let condition = next_node(&mut tail, rule, depth)?;
            let otherwise = next_node(&mut tail, rule, depth)?;
            let children = value.height.max(condition.height).max(otherwise.height);
            Node::over(
                children,
                Expr::Conditional {
                    condition: condition.boxed(),
                    then: value.boxed(),
                    otherwise: otherwise.boxed(),
                },
                at,
            )
        }
        Rule::disjunction => fold_logical(pair, Expr::Or, depth),
        Rule::conjunction => fold_logical(pair, Expr::And, depth),
        Rule::inversion => {
            // `not` operand; a bare comparison was unwrapped above
            let mut inner = significant(pair);
            let operand = next_node(&mut inner, rule, depth)?;
            Node::over(
                operand.height,
                Expr::Unary {
                    op: UnaryOp::Not,
                    operand: operand.boxed(),
                },
                at,
            )
        }
        Rule::comparison => {
            let mut inner = pair.into_inner();
            let first = next_node(&mut inner, rule, depth)?;
            let mut children = first.height;
            let mut rest = Vec::new();
            while let Some(op) = inner.next() {
                let cmp = match op.as_str() {
                    "==" => CmpOp::Eq,
                    "!=" => CmpOp::Ne,
                    "<" => CmpOp::Lt,
                    "<=" => CmpOp::Le,
                    ">" => CmpOp::Gt,
                    ">=" => CmpOp::Ge,
                    _ => return Err(malformed(rule)),
                };
                let right = next_node(&mut inner, rule, depth)?;
                children = children.max(right.height);
                rest.push((cmp, right.expr));
            }
            Node::over(
                children,
                Expr::Compare {
                    first: first.boxed(),
                    rest,
                },
                at,
            )
        }
        Rule::sum | Rule::term => {
            let mut inner = pair.into_inner();
            let mut left = next_node(&mut inner, rule, depth)?;
            while let Some(op) = inner.next() {
                let op_at = op.line_col();
                let op = match op.as_str() {
                    "+" => BinaryOp::Add,
                    "-" => BinaryOp::Sub,
                    "*" => BinaryOp::Mul,
                    "/" => BinaryOp::Div,
                    "//" => BinaryOp::FloorDiv,
                    "%" => BinaryOp::Mod,
                    _ => return Err(malformed(rule)),
                };
                let right = next_node(&mut inner, rule, depth)?;
                let children = left.height.max(right.height);
                left = Node::over(
                    children,
                    Expr::Binary {
                        op,
                        left: left.boxed(),
                        right: right.boxed(),
                    },
                    op_at,
                )?;
            }
            Ok(left)
        }
        Rule::factor => {
            let mut inner = pair.into_inner();
            let sign = inner.next().ok_or_else(|| malformed(rule))?;
            let op = if sign.as_str() == "-" {
                UnaryOp::Neg
            } else {
                UnaryOp::Pos
            };
            let operand = next_node(&mut inner, rule, depth)?;
            Node::over(
                operand.height,
                Expr::Unary {
                    op,
                    operand: operand.boxed(),
                },
                at,
            )
        }
        Rule::power => {
            let mut inner = pair.into_inner();
            let base = next_node(&mut inner, rule, depth)?;
            inner.next().ok_or_else(|| malformed(rule))?;
            let exponent = next_node(&mut inner, rule, depth)?;
            Node::over(
                base.height.max(exponent.height),
                Expr::Binary {
                    op: BinaryOp::Pow,
                    left: base.boxed(),
                    right: exponent.boxed(),
                },
                at,
            )
        }
        Rule::postfix => {
            let mut inner = pair.into_inner();
            let mut target = next_node(&mut inner, rule, depth)?;
            for trailer in inner {
                target = apply_trailer(target, trailer, depth)?;
            }
            Ok(target)
        }
        Rule::number => pair
            .as_str()
            .parse::<f64>()
            .map(|n| Node::leaf(Expr::Number(n)))
            .map_err(|e| ScriptError::Syntax {
                message: format!("invalid number '{}': {e}", pair.as_str()),
                line: at.0,
                column: at.1,
            }),
        Rule::string => {
            let chars = pair.into_inner().next().ok_or_else(|| malformed(rule))?;
            Ok(Node::leaf(Expr::Str(unescape(chars.as_str()))))
        }
        Rule::boolean => Ok(Node::leaf(Expr::Bool(pair.as_str() == "True"))),
        Rule::none => Ok(Node::leaf(Expr::None)),
        Rule::identifier => Ok(Node::leaf(Expr::Name(pair.as_str().to_string()))),
        Rule::bracket => {
            let mut inner = pair.into_inner();
            let Some(first) = inner.next() else {
                return Ok(Node::leaf(Expr::List(Vec::new())));
            };
            let first = build(first, depth)?;
            match inner.next() {
                Some(clause) if clause.as_rule() == Rule::comp_clause => {
                    comprehension(first, clause, depth, at)
                }
                tail => sequence(first, tail, depth, at, Expr::List),
            }
        }
        Rule::paren => {
            // `()` or a tuple; a lone parenthesised expression was unwrapped
            let mut inner = pair.into_inner();
            let Some(first) = inner.next() else {
                return Ok(Node::leaf(Expr::Tuple(Vec::new())));
            };
            let first = build(first, depth)?;
            sequence(first, inner.next(), depth, at, Expr::Tuple)
        }
        other => Err(malformed(other)),
    }
}

/// List or tuple from its first item and the `seq_tail` after it.
fn sequence(
    first: Node,
    tail: Option<Pair<'_, Rule>>,
    depth: usize,
    at: (usize, usize),
    make: fn(Vec<Expr>) -> Expr,
) -> ScriptResult<Node> {
    let mut items = vec![first];
    if let Some(tail) = tail {
        for item in tail.into_inner() {
            items.push(build(item, depth)?);
        }
    }
    Node::over(tallest(&items), make(exprs(items)), at)
}

fn comprehension(
    element: Node,
    clause: Pair<'_, Rule>,
    depth: usize,
    at: (usize, usize),
) -> ScriptResult<Node> {
    let rule = clause.as_rule();
    let mut inner = significant(clause);
    let targets = inner
        .next()
        .ok_or_else(|| malformed(rule))?
        .into_inner()
        .map(|p| p.as_str().to_string())
        .collect();
    let iter = next_node(&mut inner, rule, depth)?;
    let condition = match inner.next() {
        Some(filter) => Some(next_node(&mut significant(filter), rule, depth)?),
        None => None,
    };
    let children = element
        .height
        .max(iter.height)
        .max(condition.as_ref().map_or(0, |c| c.height));
    Node::over(
        children,
        Expr::ListComp {
            element: element.boxed(),
            targets,
            iter: iter.boxed(),
            condition: condition.map(Node::boxed),
        },
        at,
    )
}

fn fold_logical(
    pair: Pair<'_, Rule>,
    combine: fn(Box<Expr>, Box<Expr>) -> Expr,
    depth: usize,
) -> ScriptResult<Node> {
    let rule = pair.as_rule();
    let mut inner = significant(pair);
    let mut left = next_node(&mut inner, rule, depth)?;
    for operand in inner {
        let at = operand.line_col();
        let right = build(operand, depth)?;
        let children = left.height.max(right.height);
        left = Node::over(children, combine(left.boxed(), right.boxed()), at)?;
    }
    Ok(left)
}

fn apply_trailer(target: Node, trailer: Pair<'_, Rule>, depth: usize) -> ScriptResult<Node> {
    let rule = trailer.as_rule();
    let at = trailer.line_col();
    match rule {
        Rule::call => {
            let args = trailer
                .into_inner()
                .map(|arg| build(arg, depth))
                .collect::<ScriptResult<Vec<_>>>()?;
            Node::over(
                target.height.max(tallest(&args)),
                Expr::Call {
                    callee: target.boxed(),
                    args: exprs(args),
                },
                at,
            )
        }
        Rule::subscript => {
            let mut start = None;
            let mut slice = None;
            for part in trailer.into_inner() {
                if part.as_rule() == Rule::slice_tail {
                    slice = Some(part);
                } else {
                    start = Some(build(part, depth)?);
                }
            }
            let Some(slice) = slice else {
                let index = start.ok_or_else(|| malformed(rule))?;
                return Node::over(
                    target.height.max(index.height),
                    Expr::Index {
                        target: target.boxed(),
                        index: index.boxed(),
                    },
                    at,
                );
            };
            let end = match slice.into_inner().next() {
                Some(end) => Some(build(end, depth)?),
                None => None,
            };
            let children = target
                .height
                .max(start.as_ref().map_or(0, |n| n.height))
                .max(end.as_ref().map_or(0, |n| n.height));
            Node::over(
                children,
                Expr::Slice {
                    target: target.boxed(),
                    start: start.map(Node::boxed),
                    end: end.map(Node::boxed),
                },
                at,
            )
        }
        Rule::attribute => {
            let name = trailer.into_inner().next().ok_or_else(|| malformed(rule))?;
            Node::over(
                target.height,
                Expr::Attribute {
                    target: target.boxed(),
                    name: name.as_str().to_string(),
                },
                at,
            )
        }
        other => Err(malformed(other)),
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> Box<Expr> {
        Box::new(Expr::Name(n.to_string()))
    }

    fn num(n: f64) -> Box<Expr> {
        Box::new(Expr::Number(n))
    }

    #[test]
    fn test_precedence() {
        let expr = parse_script("1 + 2 * x").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Add,
                left: num(1.0),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    left: num(2.0),
                    right: name("x"),
                }),
            }
        );
    }

    #[test]
    fn test_power_binds_tighter_than_unary_minus() {
        let expr = parse_script("-x ** 2").unwrap();
        assert_eq!(
            expr,
            Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(Expr::Binary {
                    op: BinaryOp::Pow,
                    left: name("x"),
                    right: num(2.0),
                }),
            }
        );
    }

    #[test]
    fn test_floor_division_and_power_tokens() {
        let expr = parse_script("a // b").unwrap();
        assert!(matches!(
            expr,
            Expr::Binary {
                op: BinaryOp::FloorDiv,
                ..
            }
        ));
        let expr = parse_script("a ** b").unwrap();
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::Pow, .. }));
    }

    #[test]
    fn test_postfix_chain() {
        let expr = parse_script("numpy.sum(args[0])").unwrap();
        assert_eq!(
            expr,
            Expr::Call {
                callee: Box::new(Expr::Attribute {
                    target: name("numpy"),
                    name: "sum".to_string(),
                }),
                args: vec![Expr::Index {
                    target: name("args"),
                    index: num(0.0),
                }],
            }
        );
    }

    #[test]
    fn test_slices() {
        let expr = parse_script("x[1:]").unwrap();
        assert_eq!(
            expr,
            Expr::Slice {
                target: name("x"),
                start: Some(num(1.0)),
                end: None,
            }
        );
        let expr = parse_script("x[:-1]").unwrap();
        assert!(matches!(
            expr,
            Expr::Slice {
                start: None,
                end: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn test_tuple_group_and_list() {
        assert_eq!(parse_script("(1)").unwrap(), Expr::Number(1.0));
        assert_eq!(
            parse_script("(1,)").unwrap(),
            Expr::Tuple(vec![Expr::Number(1.0)])
        );
        assert_eq!(parse_script("()").unwrap(), Expr::Tuple(vec![]));
        assert_eq!(
            parse_script("[1, 'a',]").unwrap(),
            Expr::List(vec![Expr::Number(1.0), Expr::Str("a".to_string())])
        );
    }

    #[test]
    fn test_comprehension_with_unpacking_and_filter() {
        let expr = parse_script("[a for a, b in zip(x, y) if b]").unwrap();
        match expr {
            Expr::ListComp {
                targets, condition, ..
            } => {
                assert_eq!(targets, vec!["a".to_string(), "b".to_string()]);
                assert_eq!(condition, Some(name("b")));
            }
            other => panic!("expected comprehension, got {other:?}"),
        }
    }

    #[test]
    fn test_keywords_and_conditional() {
        let expr = parse_script("a if not b and c else d").unwrap();
        assert_eq!(
            expr,
            Expr::Conditional {
                condition: Box::new(Expr::And(
                    Box::new(Expr::Unary {
                        op: UnaryOp::Not,
                        operand: name("b"),
                    }),
                    name("c"),
                )),
                then: name("a"),
                otherwise: name("d"),
            }
        );
        // Keyword prefixes are ordinary names.
        assert_eq!(parse_script("notable").unwrap(), Expr::Name("notable".to_string()));
        assert_eq!(parse_script("Trueish").unwrap(), Expr::Name("Trueish".to_string()));
    }

    #[test]
    fn test_chained_comparison() {
        let expr = parse_script("0 <= x < 10").unwrap();
        match expr {
            Expr::Compare { rest, .. } => {
                let ops: Vec<CmpOp> = rest.iter().map(|(op, _)| *op).collect();
                assert_eq!(ops, vec![CmpOp::Le, CmpOp::Lt]);
            }
            other => panic!("expected comparison, got {other:?}"),
        }
    }

    #[test]
    fn test_string_escapes_and_comments() {
        assert_eq!(
            parse_script(r#""a\"b\n" # trailing"#).unwrap(),
            Expr::Str("a\"b\n".to_string())
        );
        assert!(parse_script("'it''s'").is_err());
    }

    #[test]
    fn test_syntax_error_position() {
        match parse_script("1 +\n  * 2") {
            Err(ScriptError::Syntax { line, column, .. }) => assert!(line >= 1 && column >= 1),
            other => panic!("expected syntax error, got {other:?}"),
        }
        assert!(parse_script("").is_err());
    }

    #[test]
    fn test_nested_brackets_parse_in_linear_time() {
        let depth = 40;
        let scripts = [
            format!("{}1{}", "(".repeat(depth), ")".repeat(depth)),
            format!("{}1{}", "[".repeat(depth), "]".repeat(depth)),
            format!("{}1{}", "([".repeat(depth), "])".repeat(depth)),
            format!("{}0{}", "x[".repeat(depth), "]".repeat(depth)),
            // Unbalanced input fails without retrying every level.
            format!("{}1", "(".repeat(depth)),
        ];
        let started = std::time::Instant::now();
        let results: Vec<_> = scripts.iter().map(|s| parse_script(s)).collect();
        assert!(
            started.elapsed() < std::time::Duration::from_secs(1),
            "nested brackets took {:?}",
            started.elapsed()
        );

        assert_eq!(results[0], Ok(Expr::Number(1.0)));
        let mut list = results[1].clone().unwrap();
        for _ in 0..depth {
            list = match list {
                Expr::List(mut items) if items.len() == 1 => items.remove(0),
                other => panic!("expected single-item list, got {other:?}"),
            };
        }
        assert_eq!(list, Expr::Number(1.0));
        assert!(results[2].is_ok());
        assert!(matches!(results[3], Ok(Expr::Index { .. })));
        assert!(matches!(results[4], Err(ScriptError::Syntax { .. })));
    }

    #[test]
    fn test_nesting_within_limit_is_accepted() {
        assert!(parse_script(&format!("{}1", "-".repeat(100))).is_ok());
        let sum = format!("1{}", " + 1".repeat(MAX_NESTING - 1));
        assert!(parse_script(&sum).is_ok());
        let sum = format!("1{}", " + 1".repeat(MAX_NESTING));
        assert!(parse_script(&sum).is_err());
    }

    #[test]
    fn test_deep_nesting_is_an_error_not_a_crash() {
        // Same stack size the blocking pool gives evaluations.
        let outcome = std::thread::Builder::new()
            .stack_size(2 << 20)
            .spawn(|| {
                [
                    format!("{}1", "-".repeat(3000)),
                    format!("{}x", "not ".repeat(3000)),
                    format!("{}1{}", "(".repeat(3000), ")".repeat(3000)),
                    format!("{}1{}", "[".repeat(3000), "]".repeat(3000)),
                    format!("1{}", " ** 1".repeat(3000)),
                    format!("1{}", " + 1".repeat(3000)),
                    format!("x{}", "[0]".repeat(3000)),
                ]
                .iter()
                .map(|s| parse_script(s))
                .collect::<Vec<_>>()
            })
            .unwrap()
            .join()
            .expect("parser thread overflowed its stack");
        for result in outcome {
            assert!(
                matches!(result, Err(ScriptError::Syntax { .. })),
                "expected syntax error, got {result:?}"
            );
        }
    }
}
