// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use crate::session::Session;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Route {
    Home,
    Login,
    Dashboard,
}

impl Route {
    const fn requires_identity(self) -> bool {
        matches!(self, Self::Dashboard)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => write!(f, "/"),
            Self::Login => write!(f, "/login"),
            Self::Dashboard => write!(f, "/dashboard"),
        }
    }
}

/// What a consumer should show for a route given the current session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Access {
    /// The session hasn't been established yet; show a loading state.
    Pending,
    Granted,
    Redirect(Route),
}

pub(crate) fn resolve(route: Route, session: &Session) -> Access {
    if !route.requires_identity() {
        Access::Granted
    } else if !session.is_initialized() {
        Access::Pending
    } else if session.identity().is_none() {
        Access::Redirect(Route::Login)
    } else {
        Access::Granted
    }
}
