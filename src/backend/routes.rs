/// What a path resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    DefaultPage,
    Slow,
    Error,
    Reset,
    Unified,
}

/// Immutable path table shared by every listener serving it.
///
/// Lookups are exact; anything unmatched falls through to the default page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    routes: Vec<(&'static str, Route)>,
}

impl RouteTable {
    /// Every fault endpoint plus the default page.
    pub fn full() -> Self {
        Self {
            routes: vec![
                ("/slow", Route::Slow),
                ("/error", Route::Error),
                ("/reset", Route::Reset),
                ("/new", Route::Unified),
                ("/", Route::DefaultPage),
            ],
        }
    }

    /// Default page only, for the failover listener.
    pub fn failover() -> Self {
        Self {
            routes: vec![("/", Route::DefaultPage)],
        }
    }

    pub fn lookup(&self, path: &str) -> Route {
        self.routes
            .iter()
            .find(|(pattern, _)| *pattern == path)
            .map(|(_, route)| *route)
            .unwrap_or(Route::DefaultPage)
    }

    pub fn paths(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.routes.iter().map(|(pattern, _)| *pattern)
    }
}
