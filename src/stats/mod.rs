//! Client-side filtering and derived figures for the admin and ride screens.
//!
//! Everything here is computed from lists the backend already returned; no
//! function in this module performs I/O.

use serde::Serialize;

use crate::models::{AccountStatus, DriverSummary, Ride, RideStatus, Role, User};

/// Search and filter criteria for the user management table.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Case-insensitive substring of name or email.
    pub search: Option<String>,
    pub role: Option<Role>,
    pub status: Option<AccountStatus>,
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        if let Some(term) = normalized(&self.search) {
            let hit = user.full_name.to_lowercase().contains(&term)
                || user.email.to_lowercase().contains(&term);
            if !hit {
                return false;
            }
        }
        if self.role.is_some_and(|role| role != user.role()) {
            return false;
        }
        if self.status.is_some_and(|status| status != user.status()) {
            return false;
        }
        true
    }

    pub fn apply<'a>(&self, users: &'a [User]) -> Vec<&'a User> {
        users.iter().filter(|u| self.matches(u)).collect()
    }
}

/// Search and filter criteria for the ride log.
#[derive(Debug, Clone, Default)]
pub struct RideFilter {
    /// Case-insensitive substring of student, driver, pickup or dropoff.
    pub search: Option<String>,
    pub status: Option<RideStatus>,
}

impl RideFilter {
    pub fn matches(&self, ride: &Ride) -> bool {
        if let Some(term) = normalized(&self.search) {
            let fields = [
                ride.student_name.as_deref().unwrap_or(""),
                ride.driver_name.as_deref().unwrap_or(""),
                ride.pickup_location.as_str(),
                ride.dropoff_location.as_str(),
            ];
            if !fields.iter().any(|f| f.to_lowercase().contains(&term)) {
                return false;
            }
        }
        match &self.status {
            Some(status) => *status == ride.status,
            None => true,
        }
    }

    pub fn apply<'a>(&self, rides: &'a [Ride]) -> Vec<&'a Ride> {
        rides.iter().filter(|r| self.matches(r)).collect()
    }
}

fn normalized(search: &Option<String>) -> Option<String> {
    search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

/// Headline numbers on the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdminKpis {
    pub total_users: usize,
    /// Verified and approved.
    pub active_users: usize,
    pub total_drivers: usize,
    /// Approved drivers.
    pub active_drivers: usize,
    pub total_students: usize,
    pub pending_approvals: usize,
}

impl AdminKpis {
    pub fn compute(users: &[User], pending: &[User]) -> Self {
        let drivers = users.iter().filter(|u| u.role() == Role::Driver);
        Self {
            total_users: users.len(),
            active_users: users
                .iter()
                .filter(|u| u.status() == AccountStatus::Active)
                .count(),
            total_drivers: drivers.clone().count(),
            active_drivers: drivers.filter(|u| u.is_approved).count(),
            total_students: users.iter().filter(|u| u.role() == Role::Student).count(),
            pending_approvals: pending.len(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub approved: usize,
    pub pending: usize,
    pub unverified: usize,
}

impl StatusCounts {
    pub fn compute(users: &[User]) -> Self {
        users.iter().fold(Self::default(), |mut counts, user| {
            match user.status() {
                AccountStatus::Active => counts.approved += 1,
                AccountStatus::PendingApproval => counts.pending += 1,
                AccountStatus::Unverified => counts.unverified += 1,
            }
            counts
        })
    }
}

/// Totals for the ride log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RideStats {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub cancelled: usize,
    /// Sum of `cost` over completed rides.
    pub revenue: f64,
}

impl RideStats {
    pub fn compute<'a>(rides: impl IntoIterator<Item = &'a Ride>) -> Self {
        rides.into_iter().fold(Self::default(), |mut stats, ride| {
            stats.total += 1;
            match ride.status {
                RideStatus::Completed => {
                    stats.completed += 1;
                    stats.revenue += ride.cost.unwrap_or(0.0);
                }
                RideStatus::InProgress => stats.in_progress += 1,
                RideStatus::Cancelled => stats.cancelled += 1,
                _ => {}
            }
            stats
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DriverAnalytics {
    pub total: usize,
    /// Active and verified.
    pub active: usize,
    pub average_rating: f64,
    pub total_reviews: u32,
    /// Drivers with at least one review, best first.
    pub top_rated: Vec<DriverSummary>,
}

impl DriverAnalytics {
    pub const TOP_RATED: usize = 5;

    pub fn compute(drivers: &[DriverSummary]) -> Self {
        let mut rated: Vec<&DriverSummary> =
            drivers.iter().filter(|d| d.total_ratings > 0).collect();
        let average_rating = if rated.is_empty() {
            0.0
        } else {
            rated.iter().map(|d| d.rating).sum::<f64>() / rated.len() as f64
        };
        rated.sort_by(|a, b| {
            b.rating
                .total_cmp(&a.rating)
                .then(b.total_ratings.cmp(&a.total_ratings))
        });

        Self {
            total: drivers.len(),
            active: drivers.iter().filter(|d| d.is_active && d.is_verified).count(),
            average_rating,
            total_reviews: drivers.iter().map(|d| d.total_ratings).sum(),
            top_rated: rated.into_iter().take(Self::TOP_RATED).cloned().collect(),
        }
    }
}

/// What a student sees above their ride history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StudentRideSummary {
    pub total: usize,
    pub completed: usize,
    /// Mean of the ratings this student has given, if any.
    pub average_rating: Option<f64>,
}

impl StudentRideSummary {
    pub fn compute(rides: &[Ride]) -> Self {
        let ratings: Vec<f64> = rides.iter().filter_map(|r| r.rating).collect();
        Self {
            total: rides.len(),
            completed: rides
                .iter()
                .filter(|r| r.status == RideStatus::Completed)
                .count(),
            average_rating: (!ratings.is_empty())
                .then(|| ratings.iter().sum::<f64>() / ratings.len() as f64),
        }
    }
}
