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

pub mod client;
pub mod codec;
pub mod command;
pub mod lex;
pub mod response;
pub mod server;
pub mod syntax;

#[cfg(test)]
mod integration_tests;
#[cfg(test)]
mod test_backend;

/// The RFC 3501 connection states, as far as the QUOTA commands care.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    NotAuthenticated,
    Authenticated,
    Selected,
    Logout,
}

impl SessionState {
    /// Whether commands valid in the "authenticated" state may be issued.
    pub fn is_authenticated(self) -> bool {
        match self {
            SessionState::Authenticated | SessionState::Selected => true,
            SessionState::NotAuthenticated | SessionState::Logout => false,
        }
    }
}
