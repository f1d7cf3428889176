//! Mana: colors, costs, and per-player pools

use serde::{Deserialize, Serialize};
use std::fmt;

/// The six mana colors (colorless included as a pool tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Color {
    White,
    Blue,
    Black,
    Red,
    Green,
    Colorless,
}

impl Color {
    /// All colors in WUBRG-then-colorless order. Generic costs are paid from
    /// the pool in this order when the controller does not specify.
    pub const ALL: [Color; 6] = [
        Color::White,
        Color::Blue,
        Color::Black,
        Color::Red,
        Color::Green,
        Color::Colorless,
    ];

    fn index(self) -> usize {
        match self {
            Color::White => 0,
            Color::Blue => 1,
            Color::Black => 2,
            Color::Red => 3,
            Color::Green => 4,
            Color::Colorless => 5,
        }
    }

    /// True for the five "true" colors (colorless is not a color).
    pub fn is_color(self) -> bool {
        self != Color::Colorless
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Color::White => 'W',
            Color::Blue => 'U',
            Color::Black => 'B',
            Color::Red => 'R',
            Color::Green => 'G',
            Color::Colorless => 'C',
        };
        write!(f, "{c}")
    }
}

/// A mana cost: generic amount plus colored pips.
///
/// Small and Copy; cost modifiers clone and adjust these freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManaCost {
    pub generic: u8,
    pips: [u8; 6],
}

impl ManaCost {
    pub fn new() -> Self {
        ManaCost::default()
    }

    /// Parse a cost string like "2RR" or "1UB". Unknown characters are
    /// ignored; a leading number is the generic component.
    pub fn from_string(s: &str) -> Self {
        let mut cost = ManaCost::new();
        let mut generic_str = String::new();

        for c in s.chars() {
            match c {
                'W' => cost.pips[0] += 1,
                'U' => cost.pips[1] += 1,
                'B' => cost.pips[2] += 1,
                'R' => cost.pips[3] += 1,
                'G' => cost.pips[4] += 1,
                'C' => cost.pips[5] += 1,
                '0'..='9' => generic_str.push(c),
                _ => {}
            }
        }

        if !generic_str.is_empty() {
            cost.generic = generic_str.parse().unwrap_or(0);
        }
        cost
    }

    pub fn pip(&self, color: Color) -> u8 {
        self.pips[color.index()]
    }

    pub fn with_pip(mut self, color: Color, count: u8) -> Self {
        self.pips[color.index()] = count;
        self
    }

    pub fn with_generic(mut self, generic: u8) -> Self {
        self.generic = generic;
        self
    }

    /// Mana value (total cost).
    pub fn mana_value(&self) -> u8 {
        self.generic + self.pips.iter().sum::<u8>()
    }

    /// Colors of the pips (the card's color identity contribution).
    pub fn colors(&self) -> Vec<Color> {
        Color::ALL
            .into_iter()
            .filter(|c| c.is_color() && self.pip(*c) > 0)
            .collect()
    }

    /// Reduce the generic component, clamping at 0.
    pub fn reduce_generic(&self, by: u8) -> Self {
        let mut out = *self;
        out.generic = out.generic.saturating_sub(by);
        out
    }

    /// Increase the generic component.
    pub fn increase_generic(&self, by: u8) -> Self {
        let mut out = *self;
        out.generic = out.generic.saturating_add(by);
        out
    }
}

impl fmt::Display for ManaCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.generic > 0 || self.mana_value() == 0 {
            write!(f, "{}", self.generic)?;
        }
        for color in Color::ALL {
            for _ in 0..self.pip(color) {
                write!(f, "{color}")?;
            }
        }
        Ok(())
    }
}

/// A player's mana pool: a non-negative amount per color tag.
///
/// Pools empty at every step and phase transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManaPool {
    amounts: [u8; 6],
}

impl ManaPool {
    pub fn new() -> Self {
        ManaPool::default()
    }

    pub fn get(&self, color: Color) -> u8 {
        self.amounts[color.index()]
    }

    pub fn add(&mut self, color: Color, amount: u8) {
        self.amounts[color.index()] = self.amounts[color.index()].saturating_add(amount);
    }

    pub fn clear(&mut self) {
        self.amounts = [0; 6];
    }

    pub fn total(&self) -> u8 {
        self.amounts.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Check whether the pool covers a cost: every colored pip, plus enough
    /// left over for the generic component.
    pub fn can_pay(&self, cost: &ManaCost) -> bool {
        for color in Color::ALL {
            if self.get(color) < cost.pip(color) {
                return false;
            }
        }
        self.total() >= cost.mana_value()
    }

    /// Deduct a cost from the pool. Colored pips are paid exactly; the
    /// generic component is paid from remaining mana in WUBRG-then-colorless
    /// order. Fails without mutation when the pool is short.
    pub fn pay(&mut self, cost: &ManaCost) -> Result<(), String> {
        if !self.can_pay(cost) {
            return Err(format!(
                "insufficient mana: need {} with {} in pool",
                cost,
                self.total()
            ));
        }

        for color in Color::ALL {
            self.amounts[color.index()] -= cost.pip(color);
        }

        let mut generic = cost.generic;
        for color in Color::ALL {
            let used = generic.min(self.amounts[color.index()]);
            self.amounts[color.index()] -= used;
            generic -= used;
        }
        debug_assert_eq!(generic, 0, "generic payment fell short after can_pay");
        Ok(())
    }
}

impl fmt::Display for ManaPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for color in Color::ALL {
            let n = self.get(color);
            if n > 0 {
                if !first {
                    write!(f, " ")?;
                }
                write!(f, "{n}{color}")?;
                first = false;
            }
        }
        if first {
            write!(f, "empty")?;
        }
        Ok(())
    }
}
