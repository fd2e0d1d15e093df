//! Address expressions, used to choose what a memory window displays.
//!
//! An address expression is a base, optionally followed by a hexadecimal offset:
//! - `8000`, `0x8000`: a hexadecimal address
//! - `main`: a label of the disassembly
//! - `sp`: the current value of a register
//! - `main+10`, `sp-8`: any of the above with an offset added or subtracted
//!
//! A base is resolved in that order, so a label or register whose name
//! is also a hexadecimal number (e.g., `add`) resolves as a number.
//!
//! ```
//! use bass_debugger::sim::addr::AddrExpr;
//!
//! let expr: AddrExpr = "sp - 10".parse().unwrap();
//! assert_eq!(expr.base(), "sp");
//! assert_eq!(expr.offset(), -0x10);
//! ```
use logos::Logos;

use crate::disasm::Disassembly;
use crate::err::AddrExprErr;

use super::{Addr, Simulator};

/// A unit of an address expression.
#[derive(Debug, Logos, PartialEq, Eq)]
#[logos(skip r"[ \t]+", error = AddrExprErr)]
pub enum Token {
    /// A number, label or register name.
    #[regex(r"[A-Za-z0-9_.$]+", |lx| lx.slice().to_string())]
    Word(String),

    /// `+`
    #[token("+")]
    Plus,

    /// `-`
    #[token("-")]
    Minus,
}

/// A parsed address expression.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct AddrExpr {
    base: String,
    offset: i64
}
impl AddrExpr {
    /// The base of the expression.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The signed offset added to the base.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Resolves the expression to an address.
    ///
    /// This returns `None` if the base is neither a number,
    /// a label of `disasm`, nor a register of `sim`.
    pub fn resolve(&self, disasm: Option<&Disassembly>, sim: &dyn Simulator) -> Option<Addr> {
        let base = parse_hex(&self.base)
            .or_else(|| disasm?.find_label(&self.base))
            .or_else(|| {
                sim.registers().iter()
                    .find(|r| r.name.eq_ignore_ascii_case(&self.base))
                    .map(|r| sim.get_register(r.id))
            })?;

        Some(base.wrapping_add(self.offset as Addr))
    }
}
impl std::str::FromStr for AddrExpr {
    type Err = AddrExprErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = Token::lexer(s);

        let Some(Token::Word(base)) = tokens.next().transpose()? else {
            return Err(AddrExprErr::MissingBase);
        };

        let sign = match tokens.next().transpose()? {
            None => return Ok(Self { base, offset: 0 }),
            Some(Token::Plus)  => 1,
            Some(Token::Minus) => -1,
            Some(Token::Word(_)) => return Err(AddrExprErr::TrailingTokens),
        };

        let offset = match tokens.next().transpose()? {
            Some(Token::Word(w)) => parse_hex(&w).ok_or(AddrExprErr::InvalidOffset)?,
            Some(_) => return Err(AddrExprErr::InvalidOffset),
            None => return Err(AddrExprErr::MissingOffset),
        };

        if tokens.next().is_some() {
            return Err(AddrExprErr::TrailingTokens);
        }

        Ok(Self { base, offset: sign * i64::from(offset) })
    }
}
impl From<Addr> for AddrExpr {
    fn from(value: Addr) -> Self {
        Self { base: format!("{value:x}"), offset: 0 }
    }
}

fn parse_hex(s: &str) -> Option<Addr> {
    let digits = s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    Addr::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use logos::Logos;

    use super::{AddrExpr, Token};
    use crate::disasm::Disassembly;
    use crate::err::AddrExprErr;
    use crate::sim::testing::{ScriptSim, SP};
    use crate::sim::Simulator;

    fn parse(s: &str) -> Result<AddrExpr, AddrExprErr> {
        s.parse()
    }

    #[test]
    fn test_lex() {
        let mut tokens = Token::lexer("main+ 1c");
        assert_eq!(tokens.next(), Some(Ok(Token::Word("main".to_string()))));
        assert_eq!(tokens.next(), Some(Ok(Token::Plus)));
        assert_eq!(tokens.next(), Some(Ok(Token::Word("1c".to_string()))));
        assert_eq!(tokens.next(), None);

        assert_eq!(Token::lexer("#").next(), Some(Err(AddrExprErr::InvalidToken)));
    }

    #[test]
    fn test_parse() {
        let e = parse("8000").unwrap();
        assert_eq!((e.base(), e.offset()), ("8000", 0));
        let e = parse("main+1c").unwrap();
        assert_eq!((e.base(), e.offset()), ("main", 0x1c));
        let e = parse(" sp - 0x8 ").unwrap();
        assert_eq!((e.base(), e.offset()), ("sp", -8));

        assert_eq!(parse(""), Err(AddrExprErr::MissingBase));
        assert_eq!(parse("+4"), Err(AddrExprErr::MissingBase));
        assert_eq!(parse("main+"), Err(AddrExprErr::MissingOffset));
        assert_eq!(parse("main+zz"), Err(AddrExprErr::InvalidOffset));
        assert_eq!(parse("main+-4"), Err(AddrExprErr::InvalidOffset));
        assert_eq!(parse("main sp"), Err(AddrExprErr::TrailingTokens));
        assert_eq!(parse("main+4+4"), Err(AddrExprErr::TrailingTokens));
        assert_eq!(parse("ma#in"), Err(AddrExprErr::InvalidToken));
    }

    #[test]
    fn test_resolve() {
        let disasm = Disassembly::parse("
00008000 <main>:
    8000:	e3a00000 	mov	r0, #0
");
        let mut sim = ScriptSim::linear(0);
        sim.set_register(SP, 0x7ff0);

        let resolve = |s: &str| parse(s).unwrap().resolve(Some(&disasm), &sim);
        assert_eq!(resolve("10"), Some(0x10));
        assert_eq!(resolve("main"), Some(0x8000));
        assert_eq!(resolve("main+20"), Some(0x8020));
        assert_eq!(resolve("SP-10"), Some(0x7fe0));
        assert_eq!(resolve("nowhere"), None);

        // without a disassembly, labels are unknown
        assert_eq!(parse("main").unwrap().resolve(None, &sim), None);
    }
}
