//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Crymap.
//
// Crymap is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Crymap is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Crymap. If not, see <http://www.gnu.org/licenses/>.

// Included directly into syntax.rs

/// Declares a C-like enum which maps to and from case-insensitive tags.
///
/// Tags are matched as whole atoms by `from_name`; `name` returns the
/// canonical (upper-case) form for writing.
macro_rules! simple_enum {
    (enum $name:ident {
         $($case_name:ident($case_repr:expr),)+
    }) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($case_name,)+
        }

        impl $name {
            pub fn from_name(s: &str) -> Option<$name> {
                $(if $case_repr.eq_ignore_ascii_case(s) {
                    return Some($name::$case_name);
                })+
                None
            }

            pub fn name(&self) -> &'static str {
                match *self {
                    $($name::$case_name => $case_repr,)+
                }
            }

            pub fn write_to(&self, lex: &mut LexWriter<impl Write>)
                            -> io::Result<()> {
                lex.verbatim(self.name())
            }
        }
    }
}
