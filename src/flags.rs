//! Behaviour flags carried by every plugin

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bit set describing when and from what a plugin gets its value
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(u8);

impl Flags {
    /// Value comes from the user data mapping
    pub const NEEDS_USERDATA: Flags = Flags(0x01);
    /// Value is extracted from an HTTP response
    pub const NEEDS_RESPONSE: Flags = Flags(0x02);
    /// Value is computed from other plugins' values
    pub const DEPENDS_ON_OTHER_PLUGINS: Flags = Flags(0x04);

    pub const fn empty() -> Self {
        Flags(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Flags::NEEDS_USERDATA, "NEEDS_USERDATA"),
            (Flags::NEEDS_RESPONSE, "NEEDS_RESPONSE"),
            (Flags::DEPENDS_ON_OTHER_PLUGINS, "DEPENDS_ON_OTHER_PLUGINS"),
        ]
        .iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| *name)
        .collect();

        if names.is_empty() {
            write!(f, "Flags(empty)")
        } else {
            write!(f, "Flags({})", names.join(" | "))
        }
    }
}
