//! Route guard for the admin back-office.
//!
//! Enforcement is client-side only; the backend checks permissions on its
//! own for every admin endpoint.

use std::fmt;
use std::str::FromStr;

use miracle_core::{UserRecord, is_user_admin};

/// Storefront and back-office routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    // Public
    Login,
    Register,
    Home,
    Products,
    Cart,
    Checkout,
    Contact,
    About,
    LearnMore,
    Recipes,
    // Admin
    AdminDashboard,
    AdminUsers,
    AdminProducts,
    AdminCategories,
    AdminCoupons,
    AdminRecipes,
}

impl Route {
    pub const ALL: [Self; 16] = [
        Self::Login,
        Self::Register,
        Self::Home,
        Self::Products,
        Self::Cart,
        Self::Checkout,
        Self::Contact,
        Self::About,
        Self::LearnMore,
        Self::Recipes,
        Self::AdminDashboard,
        Self::AdminUsers,
        Self::AdminProducts,
        Self::AdminCategories,
        Self::AdminCoupons,
        Self::AdminRecipes,
    ];

    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::Register => "/register",
            Self::Home => "/home",
            Self::Products => "/products",
            Self::Cart => "/cart",
            Self::Checkout => "/checkout",
            Self::Contact => "/contact",
            Self::About => "/about",
            Self::LearnMore => "/learnmore",
            Self::Recipes => "/recipe",
            Self::AdminDashboard => "/admin",
            Self::AdminUsers => "/user",
            Self::AdminProducts => "/addproduct",
            Self::AdminCategories => "/addcategory",
            Self::AdminCoupons => "/coupon",
            Self::AdminRecipes => "/addrecipes",
        }
    }

    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(
            self,
            Self::AdminDashboard
                | Self::AdminUsers
                | Self::AdminProducts
                | Self::AdminCategories
                | Self::AdminCoupons
                | Self::AdminRecipes
        )
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Error returned for a path no route matches.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown route: {0}")]
pub struct UnknownRoute(pub String);

impl FromStr for Route {
    type Err = UnknownRoute;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches('/');
        // The landing page and /home are the same screen.
        if trimmed.is_empty() {
            return Ok(Self::Home);
        }
        Self::ALL
            .into_iter()
            .find(|r| r.path() == trimmed)
            .ok_or_else(|| UnknownRoute(s.to_string()))
    }
}

/// Outcome of a route check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    RedirectLogin,
    RedirectHome,
}

impl Access {
    /// Where to send the visitor instead, if anywhere.
    #[must_use]
    pub const fn redirect(self) -> Option<Route> {
        match self {
            Self::Allow => None,
            Self::RedirectLogin => Some(Route::Login),
            Self::RedirectHome => Some(Route::Home),
        }
    }
}

/// Decide whether the current visitor may open `route`.
///
/// Admin routes need an authenticated admin: anonymous visitors go to the
/// login page, other users go home.
#[must_use]
pub fn check_access(route: Route, user: Option<&UserRecord>) -> Access {
    if !route.is_admin() {
        return Access::Allow;
    }
    match user {
        None => Access::RedirectLogin,
        Some(user) if is_user_admin(Some(user)) => Access::Allow,
        Some(_) => Access::RedirectHome,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_public_routes_always_allowed() {
        for route in Route::ALL.into_iter().filter(|r| !r.is_admin()) {
            assert_eq!(check_access(route, None), Access::Allow, "{route}");
        }
    }

    #[test]
    fn test_admin_routes() {
        let shopper = UserRecord {
            username: Some("asha".to_string()),
            ..Default::default()
        };
        let admin = UserRecord {
            is_staff: Some(true),
            ..Default::default()
        };

        assert_eq!(
            check_access(Route::AdminCoupons, None),
            Access::RedirectLogin
        );
        assert_eq!(
            check_access(Route::AdminCoupons, Some(&shopper)),
            Access::RedirectHome
        );
        assert_eq!(check_access(Route::AdminCoupons, Some(&admin)), Access::Allow);
        assert_eq!(Access::RedirectHome.redirect(), Some(Route::Home));
    }

    #[test]
    fn test_parse_paths() {
        assert_eq!("/".parse::<Route>().unwrap(), Route::Home);
        assert_eq!("/addproduct/".parse::<Route>().unwrap(), Route::AdminProducts);
        assert_eq!("/recipe".parse::<Route>().unwrap(), Route::Recipes);
        assert!("/nowhere".parse::<Route>().is_err());
    }
}
