//! Coin purse and the carry-up conversion.
//!
//! The Symbaroum purse only uses three coins (orteg, shilling, thaler),
//! stored in the host's copper/silver/gold fields.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Denomination {
    Cp,
    Sp,
    Ep,
    Gp,
    Pp,
}

impl fmt::Display for Denomination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self {
            Denomination::Cp => "cp",
            Denomination::Sp => "sp",
            Denomination::Ep => "ep",
            Denomination::Gp => "gp",
            Denomination::Pp => "pp",
        };
        write!(f, "{key}")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Currency {
    pub cp: u32,
    pub sp: u32,
    pub ep: u32,
    pub gp: u32,
    pub pp: u32,
}

impl Currency {
    pub fn new(cp: u32, sp: u32, gp: u32) -> Self {
        Self {
            cp,
            sp,
            gp,
            ..Self::default()
        }
    }

    pub fn get(&self, denomination: Denomination) -> u32 {
        match denomination {
            Denomination::Cp => self.cp,
            Denomination::Sp => self.sp,
            Denomination::Ep => self.ep,
            Denomination::Gp => self.gp,
            Denomination::Pp => self.pp,
        }
    }

    pub fn get_mut(&mut self, denomination: Denomination) -> &mut u32 {
        match denomination {
            Denomination::Cp => &mut self.cp,
            Denomination::Sp => &mut self.sp,
            Denomination::Ep => &mut self.ep,
            Denomination::Gp => &mut self.gp,
            Denomination::Pp => &mut self.pp,
        }
    }
}

/// One step of the conversion table: `each` coins of `from` make one `into`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyConversion {
    pub from: Denomination,
    pub into: Denomination,
    pub each: u32,
}

/// Orteg to shilling to thaler, ten to one each.
pub fn symbaroum_conversion() -> Vec<CurrencyConversion> {
    vec![
        CurrencyConversion {
            from: Denomination::Cp,
            into: Denomination::Sp,
            each: 10,
        },
        CurrencyConversion {
            from: Denomination::Sp,
            into: Denomination::Gp,
            each: 10,
        },
    ]
}

/// Convert coins upward, one table step at a time in table order.
///
/// Steps with a zero rate are skipped.
pub fn consolidate(purse: &Currency, table: &[CurrencyConversion]) -> Currency {
    let mut current = *purse;
    for step in table.iter().filter(|step| step.each > 0) {
        let up = current.get(step.from) / step.each;
        *current.get_mut(step.from) -= up * step.each;
        *current.get_mut(step.into) += up;
    }
    current
}
