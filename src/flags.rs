// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;
use std::ops::BitOr;
use std::ops::BitOrAssign;

/// A set of fields to prepend to every formatted line.
///
/// # Examples
///
/// ```
/// use rotalog::FormatFlags;
///
/// let flags = FormatFlags::LEVEL | FormatFlags::TIME;
/// assert!(flags.contains(FormatFlags::LEVEL));
/// assert!(!flags.contains(FormatFlags::FILE));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormatFlags(u8);

impl FormatFlags {
    /// The local time, as `2006/01/02 15:04:05.000`.
    pub const TIME: FormatFlags = FormatFlags(1 << 0);
    /// The call site, as `file.rs:123`.
    pub const FILE: FormatFlags = FormatFlags(1 << 1);
    /// The severity name.
    pub const LEVEL: FormatFlags = FormatFlags(1 << 2);

    const MASK: u8 = 0b111;

    /// No fields; lines consist of the message only.
    pub const fn empty() -> Self {
        FormatFlags(0)
    }

    /// Every field.
    pub const fn all() -> Self {
        FormatFlags(Self::MASK)
    }

    /// Build flags from raw bits, dropping unknown bits.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        FormatFlags(bits & Self::MASK)
    }

    /// The raw bits.
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Whether every flag in `other` is set.
    pub const fn contains(&self, other: FormatFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no flag is set.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl Default for FormatFlags {
    fn default() -> Self {
        FormatFlags::all()
    }
}

impl BitOr for FormatFlags {
    type Output = FormatFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        FormatFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for FormatFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for FormatFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (FormatFlags::TIME, "TIME"),
            (FormatFlags::FILE, "FILE"),
            (FormatFlags::LEVEL, "LEVEL"),
        ];
        let mut set = f.debug_set();
        for (flag, name) in names {
            if self.contains(flag) {
                set.entry(&format_args!("{name}"));
            }
        }
        set.finish()
    }
}
