use crate::ast::{Atom, BinaryOp, Condition, File, Operand, RelOp, Stmt, UnaryOp, Value};
use crate::diag::Diagnostic;
use crate::lexer::{TokenKind, lex};
use crate::span::{SourceId, Span, Spanned};
use chumsky::{
    IterParser, Parser as _,
    error::{RichPattern, RichReason},
    extra,
    input::{Input as _, Stream, ValueInput},
    prelude::{Rich, SimpleSpan, any, end, just, skip_then_retry_until},
};


type ParseError<'src> = Rich<'src, TokenKind>;
type ParseExtra<'src> = extra::Err<ParseError<'src>>;

pub fn parse(source_id: SourceId, source_text: &str) -> Result<File, Vec<Diagnostic>> {
    let tokens = lex(source_id, source_text)?;
    let end_offset = tokens.last().map(|token| token.span.end).unwrap_or(0);
    let token_stream = Stream::from_iter(tokens.into_iter().map(|token| {
        let span = (token.span.start..token.span.end).into();
        (token.kind, span)
    }))
    .map((end_offset..end_offset).into(), |(kind, span): (_, _)| {
        (kind, span)
    });

    let (output, errors) = file_parser(source_id)
        .parse(token_stream)
        .into_output_errors();
    let diagnostics = errors
        .into_iter()
        .map(|error| rich_error_to_diagnostic(source_id, error, "invalid syntax"))
        .collect::<Vec<_>>();

    if diagnostics.is_empty() {
        Ok(output.unwrap_or_default())
    } else {
        Err(diagnostics)
    }
}

fn file_parser<'src, I>(
    source_id: SourceId,
) -> impl chumsky::Parser<'src, I, File, ParseExtra<'src>>
where
    I: ValueInput<'src, Token = TokenKind, Span = SimpleSpan>,
{
    let separators = just(TokenKind::Newline).repeated();
    let line_end = just(TokenKind::Newline).ignored().or(end()).rewind();
    let boundary = just(TokenKind::Newline).ignored().or(end());
    let line = line_parser(source_id)
        .then_ignore(line_end)
        .recover_with(skip_then_retry_until(any().ignored(), boundary));

    separators
        .clone()
        .ignore_then(line.then_ignore(separators).repeated().collect::<Vec<_>>())
        .then_ignore(end())
        .map(|lines: Vec<Vec<Spanned<Stmt>>>| File {
            statements: lines.into_iter().flatten().collect(),
        })
}

/// One source line: an optional `label:` followed by an optional statement.
fn line_parser<'src, I>(
    source_id: SourceId,
) -> impl chumsky::Parser<'src, I, Vec<Spanned<Stmt>>, ParseExtra<'src>> + Clone
where
    I: ValueInput<'src, Token = TokenKind, Span = SimpleSpan>,
{
    let label = spanned(
        ident_parser()
            .then_ignore(just(TokenKind::Colon))
            .map(Stmt::Label),
        source_id,
    );
    let stmt = spanned(stmt_parser(source_id), source_id);

    let labelled = label
        .then(stmt.clone().or_not())
        .map(|(label, stmt)| {
            let mut statements = vec![label];
            statements.extend(stmt);
            statements
        });

    labelled.or(stmt.map(|stmt| vec![stmt])).boxed()
}

fn stmt_parser<'src, I>(
    source_id: SourceId,
) -> impl chumsky::Parser<'src, I, Stmt, ParseExtra<'src>> + Clone
where
    I: ValueInput<'src, Token = TokenKind, Span = SimpleSpan>,
{
    let operand = operand_parser(source_id);

    let sub = directive("sub").ignore_then(ident_parser()).map(Stmt::Sub);

    let end_sub = directive("end").to(Stmt::EndSub);

    let local = directive("local")
        .ignore_then(ident_parser())
        .then(ident_parser())
        .map(|(type_name, name)| Stmt::Local { type_name, name });

    let goto = just(TokenKind::Goto)
        .ignore_then(ident_parser())
        .map(Stmt::Goto);

    let call = keyword("call").ignore_then(ident_parser()).map(Stmt::Call);

    let relation = chumsky::select! {
        TokenKind::EqEq => RelOp::Eq,
        TokenKind::NotEq => RelOp::Ne,
        TokenKind::Lt => RelOp::Lt,
        TokenKind::Le => RelOp::Le,
        TokenKind::Gt => RelOp::Gt,
        TokenKind::Ge => RelOp::Ge,
    };
    let compare = operand
        .clone()
        .then(relation)
        .then(operand.clone())
        .map(|((lhs, op), rhs)| Condition::Compare { op, lhs, rhs });
    let condition = compare.or(operand.clone().map(Condition::Truth));

    let conditional = just(TokenKind::If)
        .to(false)
        .or(just(TokenKind::Unless).to(true))
        .then(condition)
        .then_ignore(just(TokenKind::Goto))
        .then(ident_parser())
        .map(|((negate, cond), label)| Stmt::If {
            negate,
            cond,
            label,
        });

    let assign = operand
        .clone()
        .then_ignore(just(TokenKind::Eq))
        .then(value_parser(source_id))
        .map(|(target, value)| Stmt::Assign { target, value });

    let mnemonic = ident_parser()
        .or(just(TokenKind::If).to("if".to_string()))
        .or(just(TokenKind::Unless).to("unless".to_string()))
        .or(just(TokenKind::New).to("new".to_string()));

    let instruction = mnemonic
        .then(
            operand
                .separated_by(just(TokenKind::Comma))
                .collect::<Vec<_>>(),
        )
        .map(|(mnemonic, operands)| Stmt::Instruction { mnemonic, operands });

    sub.or(end_sub)
        .or(local)
        .or(goto)
        .or(conditional)
        .or(call)
        .or(assign)
        .or(instruction)
        .boxed()
}

fn value_parser<'src, I>(
    source_id: SourceId,
) -> impl chumsky::Parser<'src, I, Value, ParseExtra<'src>> + Clone
where
    I: ValueInput<'src, Token = TokenKind, Span = SimpleSpan>,
{
    let operand = operand_parser(source_id);

    let type_name = chumsky::select! {
        TokenKind::Directive(name) => Atom::TypeMacro(name),
        TokenKind::Ident(name) => Atom::Ident(name),
    };
    let new = just(TokenKind::New)
        .ignore_then(spanned(type_name, source_id))
        .map(Value::New);

    let addr = keyword("addr").ignore_then(ident_parser()).map(Value::Addr);
    let defined = keyword("defined")
        .ignore_then(operand.clone())
        .map(Value::Defined);
    let clone = keyword("clone")
        .ignore_then(operand.clone())
        .map(Value::Clone);

    let op = chumsky::select! {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Mod,
        TokenKind::StarStar => BinaryOp::Pow,
        TokenKind::Shl => BinaryOp::Shl,
        TokenKind::Shr => BinaryOp::Shr,
        TokenKind::Lsr => BinaryOp::Lsr,
        TokenKind::AndAnd => BinaryOp::And,
        TokenKind::OrOr => BinaryOp::Or,
        TokenKind::TildeTilde => BinaryOp::Xor,
        TokenKind::Amp => BinaryOp::BitAnd,
        TokenKind::Pipe => BinaryOp::BitOr,
        TokenKind::Tilde => BinaryOp::BitXor,
        TokenKind::Dot => BinaryOp::Concat,
    };
    let binary = operand
        .clone()
        .then(op)
        .then(operand.clone())
        .map(|((lhs, op), rhs)| Value::Binary { op, lhs, rhs });

    // `-5` is a literal operand; `-x` is a negation.
    let unary_op = chumsky::select! {
        TokenKind::Bang => UnaryOp::Not,
        TokenKind::Minus => UnaryOp::Neg,
        TokenKind::Tilde => UnaryOp::BitNot,
    };
    let unary = unary_op
        .then(operand.clone())
        .map(|(op, operand)| Value::Unary { op, operand });

    new.or(addr)
        .or(defined)
        .or(clone)
        .or(binary)
        .or(operand.map(Value::Operand))
        .or(unary)
        .boxed()
}

fn operand_parser<'src, I>(
    source_id: SourceId,
) -> impl chumsky::Parser<'src, I, Spanned<Operand>, ParseExtra<'src>> + Clone
where
    I: ValueInput<'src, Token = TokenKind, Span = SimpleSpan>,
{
    let key_group = spanned(atom_parser(), source_id)
        .separated_by(just(TokenKind::Semi))
        .at_least(1)
        .collect::<Vec<_>>()
        .delimited_by(just(TokenKind::LBracket), just(TokenKind::RBracket));
    let keys = key_group
        .repeated()
        .collect::<Vec<_>>()
        .map(|groups: Vec<Vec<Spanned<Atom>>>| groups.into_iter().flatten().collect());

    spanned(
        atom_parser()
            .then(keys)
            .map(|(base, keys)| Operand { base, keys }),
        source_id,
    )
    .boxed()
}

fn atom_parser<'src, I>() -> impl chumsky::Parser<'src, I, Atom, ParseExtra<'src>> + Clone
where
    I: ValueInput<'src, Token = TokenKind, Span = SimpleSpan>,
{
    let negative = just(TokenKind::Minus).ignore_then(chumsky::select! {
        TokenKind::Int(value) => Atom::Int(-value),
        TokenKind::Float(text) => Atom::Float(format!("-{text}")),
    });

    chumsky::select! {
        TokenKind::Int(value) => Atom::Int(value),
        TokenKind::Float(text) => Atom::Float(text),
        TokenKind::String(text) => Atom::Str(text),
        TokenKind::Register(name) => Atom::Register(name),
        TokenKind::Ident(name) => Atom::Ident(name),
        TokenKind::Directive(name) => Atom::TypeMacro(name),
    }
    .or(negative)
    .boxed()
}

fn directive<'src, I>(
    name: &str,
) -> impl chumsky::Parser<'src, I, TokenKind, ParseExtra<'src>> + Clone
where
    I: ValueInput<'src, Token = TokenKind, Span = SimpleSpan>,
{
    just(TokenKind::Directive(name.to_string()))
}

/// A word that is only special in one position, such as `clone` after `=`.
fn keyword<'src, I>(
    name: &str,
) -> impl chumsky::Parser<'src, I, TokenKind, ParseExtra<'src>> + Clone
where
    I: ValueInput<'src, Token = TokenKind, Span = SimpleSpan>,
{
    just(TokenKind::Ident(name.to_string()))
}

fn ident_parser<'src, I>() -> impl chumsky::Parser<'src, I, String, ParseExtra<'src>> + Clone
where
    I: ValueInput<'src, Token = TokenKind, Span = SimpleSpan>,
{
    chumsky::select! { TokenKind::Ident(value) => value }.boxed()
}

fn spanned<'src, I, T, P>(
    parser: P,
    source_id: SourceId,
) -> impl chumsky::Parser<'src, I, Spanned<T>, ParseExtra<'src>> + Clone
where
    I: ValueInput<'src, Token = TokenKind, Span = SimpleSpan>,
    P: chumsky::Parser<'src, I, T, ParseExtra<'src>> + Clone,
{
    parser.map_with(move |node, extra| {
        let range = extra.span().into_range();
        Spanned::new(node, Span::new(source_id, range.start, range.end))
    })
}

fn rich_error_to_diagnostic(
    source_id: SourceId,
    error: Rich<'_, TokenKind>,
    context: &str,
) -> Diagnostic {
    let range = error.span().into_range();
    let mut span = Span::new(source_id, range.start, range.end);
    let message = match error.reason() {
        RichReason::Custom(custom) => format!("{context}: {custom}"),
        RichReason::ExpectedFound { expected, found } => {
            if found
                .as_deref()
                .is_some_and(|token| matches!(token, TokenKind::Newline))
            {
                span = Span::new(source_id, range.start, range.start);
            }
            let expected = format_expected_patterns(expected);
            let found = found
                .as_deref()
                .map(token_kind_message)
                .unwrap_or_else(|| "end of input".to_string());
            if expected.len() > 80 {
                format!("{context}: unexpected {found}")
            } else {
                format!("{context}: expected {expected}, found {found}")
            }
        }
    };
    Diagnostic::error(span, message)
}

fn format_expected_patterns(expected: &[RichPattern<'_, TokenKind>]) -> String {
    let mut values = Vec::new();
    for pattern in expected {
        let text = rich_pattern_message(pattern);
        if !values.contains(&text) {
            values.push(text);
        }
    }

    match values.as_slice() {
        [] => "something else".to_string(),
        [single] => single.clone(),
        [a, b] => format!("{a} or {b}"),
        [head @ .., tail] => format!("{}, or {tail}", head.join(", ")),
    }
}

fn rich_pattern_message(pattern: &RichPattern<'_, TokenKind>) -> String {
    match pattern {
        RichPattern::Token(token) => token_kind_message(token),
        RichPattern::Label(label) => label.to_string(),
        RichPattern::Identifier(identifier) => format!("'{identifier}'"),
        RichPattern::Any => "any token".to_string(),
        RichPattern::EndOfInput => "end of input".to_string(),
        _ => "something else".to_string(),
    }
}

fn token_kind_message(token: &TokenKind) -> String {
    match token {
        TokenKind::Goto => "'goto'".to_string(),
        TokenKind::If => "'if'".to_string(),
        TokenKind::Unless => "'unless'".to_string(),
        TokenKind::New => "'new'".to_string(),
        TokenKind::Comma => "','".to_string(),
        TokenKind::Colon => "':'".to_string(),
        TokenKind::Semi => "';'".to_string(),
        TokenKind::LBracket => "'['".to_string(),
        TokenKind::RBracket => "']'".to_string(),
        TokenKind::Eq => "'='".to_string(),
        TokenKind::Plus => "'+'".to_string(),
        TokenKind::Minus => "'-'".to_string(),
        TokenKind::Star => "'*'".to_string(),
        TokenKind::Slash => "'/'".to_string(),
        TokenKind::Dot => "'.'".to_string(),
        TokenKind::Percent => "'%'".to_string(),
        TokenKind::StarStar => "'**'".to_string(),
        TokenKind::Shl => "'<<'".to_string(),
        TokenKind::Shr => "'>>'".to_string(),
        TokenKind::Lsr => "'>>>'".to_string(),
        TokenKind::AndAnd => "'&&'".to_string(),
        TokenKind::OrOr => "'||'".to_string(),
        TokenKind::TildeTilde => "'~~'".to_string(),
        TokenKind::Amp => "'&'".to_string(),
        TokenKind::Pipe => "'|'".to_string(),
        TokenKind::Tilde => "'~'".to_string(),
        TokenKind::Bang => "'!'".to_string(),
        TokenKind::EqEq => "'=='".to_string(),
        TokenKind::NotEq => "'!='".to_string(),
        TokenKind::Lt => "'<'".to_string(),
        TokenKind::Le => "'<='".to_string(),
        TokenKind::Gt => "'>'".to_string(),
        TokenKind::Ge => "'>='".to_string(),
        TokenKind::Newline => "newline".to_string(),
        TokenKind::Directive(name) => format!("'.{name}'"),
        TokenKind::String(_) => "string literal".to_string(),
        TokenKind::Float(_) => "float literal".to_string(),
        TokenKind::Int(_) => "integer literal".to_string(),
        TokenKind::Register(name) => format!("register '{name}'"),
        TokenKind::Ident(value) => format!("identifier '{value}'"),
    }
}
