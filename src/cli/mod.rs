//! CLI module for the ridedesk command-line interface.
//!
//! Every command is a thin consumer of the library:
//! - `login` / `logout` / `whoami` / `refresh` - session lifecycle
//! - `open <path>` / `nav` - what the access gate shows for a page
//! - `rides ...` - student and driver ride screens
//! - `admin ...` - approvals, user management, ride log and analytics
//! - `config check` - validate the configuration file
//!
//! Commands that open a protected area ask the gate first and refuse to run
//! when it would not render the page.

use anyhow::{anyhow, Context as _, Result};
use chrono::{DateTime, NaiveDateTime};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::api::{self, ApiError};
use crate::client::ApiClient;
use crate::config::Config;
use crate::gate::{self, FailureAction, Frame, Screen};
use crate::models::{AccountStatus, RegisterRequest, Ride, RideStatus, Role, RoleProfile, User};
use crate::routes::{self, Section, SETTINGS_PATH};
use crate::session::{FileStorage, SessionStore};
use crate::stats::{
    DriverAnalytics, RideFilter, RideStats, StatusCounts, StudentRideSummary, UserFilter,
};
use crate::view::{AdminDashboard, Loadable, ViewScope};

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "ridedesk")]
#[command(author, version, about = "Client for the campus ride coordination service", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "ridedesk.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Backend URL (overrides api.base_url from the config file)
    #[arg(long, env = "RIDEDESK_API_URL")]
    pub api_url: Option<String>,

    /// Session file (overrides session.path from the config file)
    #[arg(long, env = "RIDEDESK_SESSION")]
    pub session: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and store the session
    Login {
        email: String,
        #[arg(long, env = "RIDEDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Re-read the logged-in user from the server (e.g. after approval)
    Refresh,

    /// Create an account
    Register {
        email: String,
        #[arg(long)]
        name: String,
        /// student or driver
        #[arg(long, default_value = "student")]
        role: Role,
        #[arg(long, env = "RIDEDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Confirm an email address with the token from the verification mail
    VerifyEmail { token: String },

    /// Send the verification mail again (defaults to the logged-in user)
    ResendVerification { email: Option<String> },

    /// Request a password reset link
    ForgotPassword { email: String },

    /// Check whether a password reset token is still valid
    CheckResetToken { token: String },

    /// Set a new password using a reset token
    ResetPassword {
        token: String,
        #[arg(long, env = "RIDEDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Change the password of the logged-in user
    ChangePassword {
        #[arg(long)]
        old: String,
        #[arg(long)]
        new: String,
    },

    /// Profile management commands
    #[command(subcommand)]
    Profile(ProfileCommands),

    /// Show what the app displays for a path, e.g. `/admin/approvals`
    Open { path: String },

    /// Show the navigation bar for the logged-in user
    Nav,

    /// Ride commands
    #[command(subcommand)]
    Rides(RidesCommands),

    /// Administrator commands
    #[command(subcommand)]
    Admin(AdminCommands),

    /// Notification commands
    #[command(subcommand)]
    Notifications(NotificationCommands),

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// Update profile fields: `phone=555-0101`, or `capacity:=4` for raw JSON
    Set {
        #[arg(required = true, value_parser = parse_field)]
        fields: Vec<(String, Value)>,
    },
}

#[derive(Subcommand, Debug)]
pub enum RidesCommands {
    /// List your rides (the full ride log for admins)
    List {
        #[arg(short, long)]
        search: Option<String>,
        #[arg(long, value_parser = parse_status)]
        status: Option<RideStatus>,
    },
    /// Rides waiting for a driver
    Available,
    /// Accept a ride request
    Accept { id: i64 },
    /// Move a ride to a new status
    Status {
        id: i64,
        #[arg(value_parser = parse_status)]
        status: RideStatus,
    },
    /// Rate a completed ride (1-5)
    Rate {
        id: i64,
        rating: u8,
        #[arg(long)]
        comment: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum AdminCommands {
    /// List users
    Users {
        #[arg(short, long)]
        search: Option<String>,
        #[arg(long)]
        role: Option<Role>,
        /// approved, pending or unverified
        #[arg(long)]
        status: Option<AccountStatus>,
    },
    /// Users waiting for approval
    Pending,
    /// All students
    Students,
    /// All drivers with their ratings
    Drivers,
    /// Show one user's account
    User { id: i64 },
    /// Full record of one student
    Student { id: i64 },
    /// Reviews left for a driver
    Ratings { id: i64 },
    /// The ride log
    Rides {
        #[arg(short, long)]
        search: Option<String>,
        #[arg(long, value_parser = parse_status)]
        status: Option<RideStatus>,
    },
    /// Approve a pending user
    Approve { id: i64 },
    ActivateDriver { id: i64 },
    ActivateStudent { id: i64 },
    DeleteDriver { id: i64 },
    DeleteStudent { id: i64 },
    /// Delete any account
    DeleteUser { id: i64 },
    /// Change a user's role
    SetRole { id: i64, role: Role },
    /// Headline numbers
    Dashboard,
    /// Driver performance and ride totals
    Analytics,
}

#[derive(Subcommand, Debug)]
pub enum NotificationCommands {
    List,
    /// Mark a notification as read
    Read { id: i64 },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

/// Known ride statuses only; the lenient wire conversion keeps unknown
/// strings, which is wrong for user input.
fn parse_status(s: &str) -> Result<RideStatus, String> {
    s.parse()
}

/// Parse `key=value` (string) or `key:=json` (raw JSON value).
fn parse_field(s: &str) -> Result<(String, Value), String> {
    if let Some((key, raw)) = s.split_once(":=") {
        let value = serde_json::from_str(raw).map_err(|e| format!("invalid JSON for {}: {}", key, e))?;
        return Ok((key.to_string(), value));
    }
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {:?}", s))?;
    if key.is_empty() {
        return Err(format!("missing field name in {:?}", s));
    }
    Ok((key.to_string(), Value::String(value.to_string())))
}

// ============================================================================
// Command context
// ============================================================================

struct Context {
    client: ApiClient,
}

impl Context {
    fn new(cli: &Cli, config: &Config) -> Result<Self> {
        let base_url = cli.api_url.as_deref().unwrap_or(&config.api.base_url);
        let session_path = cli.session.as_ref().unwrap_or(&config.session.path);
        let store = SessionStore::new(FileStorage::new(session_path));
        let client = ApiClient::new(base_url, store).context("Failed to create HTTP client")?;
        Ok(Self { client })
    }

    fn store(&self) -> &SessionStore {
        self.client.session()
    }

    fn role(&self) -> Result<Role> {
        self.store()
            .load()
            .map(|s| s.user.role())
            .ok_or_else(|| anyhow!(blocked_message(&Screen::RedirectToLogin)))
    }

    /// Ask the gate about `path`; error out unless the page would render.
    fn require(&self, path: &str) -> Result<Screen> {
        let screen = gate::evaluate_store(self.store(), path);
        if screen.renders_content() {
            Ok(screen)
        } else {
            Err(anyhow!(blocked_message(&screen)))
        }
    }

    /// Gate check for one of the logged-in user's own sections.
    fn require_section(&self, section: Section) -> Result<Role> {
        let role = self.role()?;
        self.require(&routes::path_for(role, &section))?;
        Ok(role)
    }

    /// Translate an API failure the way a page would: 401 logs out, the rest
    /// becomes a message.
    fn fail(&self, err: ApiError) -> anyhow::Error {
        match err {
            ApiError::Client(e) => match gate::on_failure(&e, self.store()) {
                FailureAction::RedirectToLogin => {
                    anyhow!("Your session has expired. Log in again with `ridedesk login`.")
                }
                FailureAction::Inline(message) => anyhow!(message),
            },
            ApiError::Session(e) => anyhow::Error::new(e).context("Failed to update local session"),
            ApiError::Invalid(message) => anyhow!(message),
        }
    }
}

/// Failure message for commands used while logged out, where a 401 means bad
/// credentials rather than an expired session.
fn public_failure(err: ApiError) -> anyhow::Error {
    match err.client_error().and_then(|e| e.server_message()) {
        Some(message) => anyhow!(message),
        None => anyhow::Error::new(err),
    }
}

fn blocked_message(screen: &Screen) -> String {
    match screen {
        Screen::RedirectToLogin => "Not logged in. Run `ridedesk login <email>` first.".to_string(),
        Screen::VerifyEmail { email } => format!(
            "Email not verified. Check the inbox of {} or run `ridedesk resend-verification`.",
            email
        ),
        Screen::PendingApproval => format!(
            "Account pending approval. Only {} is available until an administrator approves you.",
            SETTINGS_PATH
        ),
        Screen::RedirectToHome { path } => {
            format!("That area is not available to your role. Your home is {}.", path)
        }
        Screen::SettingsOnly | Screen::App(_) => String::new(),
    }
}

fn print_message(response: &crate::models::MessageResponse, fallback: &str) {
    println!("[OK] {}", response.message.as_deref().unwrap_or(fallback));
}

// ============================================================================
// CLI Command Handlers
// ============================================================================

/// Run a CLI command
pub async fn run_command(cli: &Cli, config: &Config) -> Result<()> {
    if let Commands::Config(ConfigCommands::Check) = &cli.command {
        return cmd_config_check(cli);
    }

    let ctx = Context::new(cli, config)?;
    match &cli.command {
        Commands::Login { email, password } => cmd_login(&ctx, email, password).await,
        Commands::Logout => {
            api::auth::logout(&ctx.client).map_err(|e| ctx.fail(e))?;
            println!("[OK] Logged out");
            Ok(())
        }
        Commands::Whoami => cmd_whoami(&ctx),
        Commands::Refresh => cmd_refresh(&ctx).await,
        Commands::Register {
            email,
            name,
            role,
            password,
        } => cmd_register(&ctx, email, name, *role, password).await,
        Commands::VerifyEmail { token } => {
            let response = api::auth::verify_email(&ctx.client, token)
                .await
                .map_err(public_failure)?;
            print_message(&response, "Email verified");
            Ok(())
        }
        Commands::ResendVerification { email } => cmd_resend_verification(&ctx, email.as_deref()).await,
        Commands::ForgotPassword { email } => {
            let response = api::auth::forgot_password(&ctx.client, email)
                .await
                .map_err(public_failure)?;
            print_message(&response, "If the address is registered, a reset link is on its way");
            Ok(())
        }
        Commands::CheckResetToken { token } => {
            let valid = api::auth::validate_reset_token(&ctx.client, token)
                .await
                .map_err(public_failure)?;
            if valid {
                println!("[OK] Reset token is valid");
                Ok(())
            } else {
                anyhow::bail!("Reset token is invalid or expired")
            }
        }
        Commands::ResetPassword { token, password } => {
            let response = api::auth::reset_password(&ctx.client, token, password)
                .await
                .map_err(public_failure)?;
            print_message(&response, "Password reset");
            Ok(())
        }
        Commands::ChangePassword { old, new } => {
            ctx.require(SETTINGS_PATH)?;
            let response = api::auth::change_password(&ctx.client, old, new)
                .await
                .map_err(|e| ctx.fail(e))?;
            print_message(&response, "Password changed");
            Ok(())
        }
        Commands::Profile(ProfileCommands::Set { fields }) => cmd_profile_set(&ctx, fields).await,
        Commands::Open { path } => cmd_open(&ctx, path),
        Commands::Nav => cmd_nav(&ctx),
        Commands::Rides(command) => cmd_rides(&ctx, command).await,
        Commands::Admin(command) => cmd_admin(&ctx, command).await,
        Commands::Notifications(command) => cmd_notifications(&ctx, command).await,
        Commands::Config(ConfigCommands::Check) => cmd_config_check(cli),
    }
}

async fn cmd_login(ctx: &Context, email: &str, password: &str) -> Result<()> {
    let session = api::auth::login(&ctx.client, email, password)
        .await
        .map_err(public_failure)?;
    let user = &session.user;
    println!("[OK] Logged in as {} ({})", user.full_name, user.role());

    match gate::evaluate(Some(&session), &user.role().home_path()) {
        Screen::App(frame) => println!("Home: {} ({})", frame.role.home_path(), frame.role.panel_label()),
        other => println!("[!!] {}", blocked_message(&other)),
    }
    Ok(())
}

fn cmd_whoami(ctx: &Context) -> Result<()> {
    let session = ctx
        .store()
        .load()
        .ok_or_else(|| anyhow!(blocked_message(&Screen::RedirectToLogin)))?;
    print_user(&session.user);
    Ok(())
}

async fn cmd_refresh(ctx: &Context) -> Result<()> {
    ctx.role()?;
    match api::auth::refresh(&ctx.client).await.map_err(|e| ctx.fail(e))? {
        Some(user) => {
            println!("[OK] Session refreshed");
            print_user(&user);
        }
        None => println!("[!!] Session changed while refreshing; nothing updated"),
    }
    Ok(())
}

async fn cmd_register(
    ctx: &Context,
    email: &str,
    name: &str,
    role: Role,
    password: &str,
) -> Result<()> {
    if role == Role::Admin {
        anyhow::bail!("Administrator accounts cannot be self-registered");
    }
    let request = RegisterRequest {
        email: email.to_string(),
        password: password.to_string(),
        full_name: name.to_string(),
        user_type: role,
    };
    let response = api::auth::register(&ctx.client, &request)
        .await
        .map_err(public_failure)?;
    println!(
        "[OK] {}",
        response.message.as_deref().unwrap_or("Registration successful")
    );
    if response.email_sent == Some(false) {
        println!("[!!] The verification email could not be sent. Run `ridedesk resend-verification {}`.", email);
    } else {
        println!("Check {} for a verification link.", email);
    }
    Ok(())
}

async fn cmd_resend_verification(ctx: &Context, email: Option<&str>) -> Result<()> {
    let email = match email {
        Some(email) => email.to_string(),
        None => match gate::evaluate_store(ctx.store(), SETTINGS_PATH) {
            Screen::VerifyEmail { email } => email,
            Screen::RedirectToLogin => anyhow::bail!("Not logged in; pass the email address explicitly"),
            _ => {
                println!("[OK] Your email is already verified");
                return Ok(());
            }
        },
    };
    let response = api::auth::resend_verification(&ctx.client, &email)
        .await
        .map_err(public_failure)?;
    print_message(&response, "Verification email sent");
    Ok(())
}

async fn cmd_profile_set(ctx: &Context, fields: &[(String, Value)]) -> Result<()> {
    ctx.require(SETTINGS_PATH)?;
    let fields: Map<String, Value> = fields.iter().cloned().collect();
    match api::auth::update_profile(&ctx.client, &fields)
        .await
        .map_err(|e| ctx.fail(e))?
    {
        Some(user) => {
            println!("[OK] Profile updated");
            print_user(&user);
        }
        None => println!("[!!] Profile saved on the server, but you logged out meanwhile"),
    }
    Ok(())
}

fn cmd_open(ctx: &Context, path: &str) -> Result<()> {
    let mut screen = gate::evaluate_store(ctx.store(), path);
    if let Screen::RedirectToHome { path: home } = &screen {
        println!("Redirecting to {}", home);
        screen = gate::evaluate_store(ctx.store(), home);
    }

    match &screen {
        Screen::App(frame) => print_frame(frame),
        Screen::SettingsOnly => {
            println!();
            println!("=== Settings ===");
            println!();
            println!("Limited access while your account awaits approval.");
            println!("Use `ridedesk profile set` or `ridedesk change-password`.");
            println!();
        }
        Screen::VerifyEmail { .. } => {
            println!("[!!] {}", blocked_message(&screen));
            println!("     Or `ridedesk logout` to use another account.");
        }
        Screen::PendingApproval => {
            println!("[!!] {}", blocked_message(&screen));
            println!("     Try `ridedesk refresh` once you have been approved, or `ridedesk logout`.");
        }
        Screen::RedirectToLogin | Screen::RedirectToHome { .. } => {
            println!("[!!] {}", blocked_message(&screen));
        }
    }
    Ok(())
}

fn cmd_nav(ctx: &Context) -> Result<()> {
    let role = ctx.role()?;
    match ctx.require(&role.home_path())? {
        Screen::App(frame) => print_frame(&frame),
        _ => println!("Settings: {}", SETTINGS_PATH),
    }
    Ok(())
}

fn print_frame(frame: &Frame) {
    println!();
    println!("=== {}: {} ===", frame.role.panel_label(), frame.title);
    println!();
    for item in &frame.nav {
        let marker = if item.section == frame.section { ">" } else { " " };
        println!(
            "  {} {:<20} {}",
            marker,
            item.label,
            routes::path_for(frame.role, &item.section)
        );
    }
    println!();
}

fn print_user(user: &User) {
    println!();
    println!("=== {} ===", user.full_name);
    println!();
    println!("ID:         {}", user.id);
    println!("Email:      {}", user.email);
    println!("Role:       {}", user.role());
    let status_icon = if user.status() == AccountStatus::Active { "[OK]" } else { "[!!]" };
    println!("Status:     {} {}", status_icon, user.status().as_str());
    if let Some(phone) = &user.phone {
        println!("Phone:      {}", phone);
    }
    match &user.profile {
        RoleProfile::Student(profile) => {
            if let Some(id) = &profile.student_id {
                println!("Student ID: {}", id);
            }
            if let Some(major) = &profile.major {
                println!("Major:      {}", major);
            }
            if let Some(contact) = &profile.emergency_contact {
                println!("Emergency:  {}", contact);
            }
        }
        RoleProfile::Driver(profile) => {
            let vehicle = [profile.vehicle_color.as_deref(), profile.vehicle_model.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            if !vehicle.is_empty() {
                println!("Vehicle:    {}", vehicle);
            }
            if let Some(plate) = &profile.vehicle_plate {
                println!("Plate:      {}", plate);
            }
            if let Some(capacity) = profile.capacity {
                println!("Capacity:   {}", capacity);
            }
        }
        RoleProfile::Admin => {}
    }
    if let Some(created) = &user.created_at {
        println!("Joined:     {}", format_date(created));
    }
    println!();
}

// ============================================================================
// Rides
// ============================================================================

async fn cmd_rides(ctx: &Context, command: &RidesCommands) -> Result<()> {
    match command {
        RidesCommands::List { search, status } => {
            let role = ctx.require_section(Section::Rides)?;
            let rides = api::rides::rides_for(&ctx.client, role)
                .await
                .map_err(|e| ctx.fail(e))?;
            let filter = RideFilter {
                search: search.clone(),
                status: status.clone(),
            };
            let shown = filter.apply(&rides);
            print_rides(&shown, role);

            match role {
                Role::Student => {
                    let summary = StudentRideSummary::compute(&rides);
                    print!("Total: {}  Completed: {}", summary.total, summary.completed);
                    match summary.average_rating {
                        Some(avg) => println!("  Avg rating given: {:.1}", avg),
                        None => println!(),
                    }
                }
                Role::Driver | Role::Admin => print_ride_stats(&RideStats::compute(shown.iter().copied())),
            }
            Ok(())
        }
        RidesCommands::Available => {
            ctx.require(&routes::path_for(Role::Driver, &Section::AvailableRides))?;
            let rides = api::rides::available_rides(&ctx.client)
                .await
                .map_err(|e| ctx.fail(e))?;
            let rides: Vec<&Ride> = rides.iter().collect();
            print_rides(&rides, Role::Driver);
            Ok(())
        }
        RidesCommands::Accept { id } => {
            ctx.require(&routes::path_for(Role::Driver, &Section::AvailableRides))?;
            let response = api::rides::accept_ride(&ctx.client, *id)
                .await
                .map_err(|e| ctx.fail(e))?;
            print_message(&response, "Ride accepted");
            Ok(())
        }
        RidesCommands::Status { id, status } => {
            ctx.require_section(Section::Rides)?;
            let response = api::rides::update_status(&ctx.client, *id, status.clone())
                .await
                .map_err(|e| ctx.fail(e))?;
            print_message(&response, "Ride status updated");
            Ok(())
        }
        RidesCommands::Rate { id, rating, comment } => {
            ctx.require(&routes::path_for(Role::Student, &Section::Rides))?;
            let response = api::rides::rate_ride(&ctx.client, *id, *rating, comment.clone())
                .await
                .map_err(|e| ctx.fail(e))?;
            print_message(&response, "Thanks for rating your ride");
            Ok(())
        }
    }
}

fn print_rides(rides: &[&Ride], viewer: Role) {
    if rides.is_empty() {
        println!("No rides found.");
        return;
    }

    let counterpart = match viewer {
        Role::Student => "DRIVER",
        Role::Driver => "STUDENT",
        Role::Admin => "STUDENT / DRIVER",
    };
    println!();
    println!(
        "{:<6}  {:<12}  {:<40}  {:<24}  {:<18}  {:>8}",
        "ID", "STATUS", "ROUTE", counterpart, "PICKUP", "COST"
    );
    println!("{}", "-".repeat(118));

    for ride in rides {
        let who = match viewer {
            Role::Student => ride.driver_name.clone().unwrap_or_else(|| "-".to_string()),
            Role::Driver => ride.student_name.clone().unwrap_or_else(|| "-".to_string()),
            Role::Admin => format!(
                "{} / {}",
                ride.student_name.as_deref().unwrap_or("-"),
                ride.driver_name.as_deref().unwrap_or("-")
            ),
        };
        let pickup = ride
            .pickup_time
            .as_deref()
            .map(format_date)
            .unwrap_or_else(|| "-".to_string());
        let cost = ride
            .cost
            .map(|c| format!("{:.2}", c))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<6}  {:<12}  {:<40}  {:<24}  {:<18}  {:>8}",
            ride.id,
            ride.status.as_str(),
            truncate(&ride.route(), 40),
            truncate(&who, 24),
            pickup,
            cost
        );
    }
    println!();
}

fn print_ride_stats(stats: &RideStats) {
    println!(
        "Total: {}  Completed: {}  In progress: {}  Cancelled: {}  Revenue: {:.2}",
        stats.total, stats.completed, stats.in_progress, stats.cancelled, stats.revenue
    );
}

// ============================================================================
// Admin
// ============================================================================

fn admin_path(section: Section) -> String {
    routes::path_for(Role::Admin, &section)
}

async fn cmd_admin(ctx: &Context, command: &AdminCommands) -> Result<()> {
    match command {
        AdminCommands::Users {
            search,
            role,
            status,
        } => {
            ctx.require(&admin_path(Section::Users))?;
            let users = api::admin::list_users(&ctx.client)
                .await
                .map_err(|e| ctx.fail(e))?;
            let filter = UserFilter {
                search: search.clone(),
                role: *role,
                status: *status,
            };
            print_users(&filter.apply(&users));
            let counts = StatusCounts::compute(&users);
            println!(
                "Approved: {}  Pending: {}  Unverified: {}",
                counts.approved, counts.pending, counts.unverified
            );
            Ok(())
        }
        AdminCommands::Pending => {
            ctx.require(&admin_path(Section::Approvals))?;
            let users = api::admin::pending_users(&ctx.client)
                .await
                .map_err(|e| ctx.fail(e))?;
            if users.is_empty() {
                println!("[OK] No users waiting for approval");
                return Ok(());
            }
            print_users(&users.iter().collect::<Vec<_>>());
            Ok(())
        }
        AdminCommands::Students => {
            ctx.require(&admin_path(Section::Students))?;
            let users = api::admin::all_students(&ctx.client)
                .await
                .map_err(|e| ctx.fail(e))?;
            print_users(&users.iter().collect::<Vec<_>>());
            Ok(())
        }
        AdminCommands::Drivers => {
            ctx.require(&admin_path(Section::Drivers))?;
            let drivers = api::admin::all_drivers(&ctx.client)
                .await
                .map_err(|e| ctx.fail(e))?;
            print_drivers(&drivers);
            Ok(())
        }
        AdminCommands::User { id } => {
            ctx.require(&admin_path(Section::Users))?;
            let user = api::admin::user(&ctx.client, *id)
                .await
                .map_err(|e| ctx.fail(e))?;
            print_user(&user);
            Ok(())
        }
        AdminCommands::Student { id } => {
            ctx.require(&admin_path(Section::Students))?;
            let record = api::admin::student(&ctx.client, *id)
                .await
                .map_err(|e| ctx.fail(e))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&record).context("Failed to format student record")?
            );
            Ok(())
        }
        AdminCommands::Ratings { id } => {
            ctx.require(&admin_path(Section::Drivers))?;
            let reviews = api::admin::driver_ratings(&ctx.client, *id)
                .await
                .map_err(|e| ctx.fail(e))?;
            println!();
            println!(
                "Average rating: {:.1} ({} ratings)",
                reviews.stats.average_rating, reviews.stats.total_ratings
            );
            println!();
            for review in &reviews.ratings {
                println!(
                    "  {:<5} {:<20} {}",
                    stars(review.rating),
                    truncate(review.student_name.as_deref().unwrap_or("-"), 20),
                    review.comment.as_deref().unwrap_or("")
                );
            }
            println!();
            Ok(())
        }
        AdminCommands::Rides { search, status } => {
            ctx.require(&admin_path(Section::Rides))?;
            let rides = api::admin::all_rides(&ctx.client)
                .await
                .map_err(|e| ctx.fail(e))?;
            let filter = RideFilter {
                search: search.clone(),
                status: status.clone(),
            };
            let shown = filter.apply(&rides);
            print_rides(&shown, Role::Admin);
            print_ride_stats(&RideStats::compute(shown.iter().copied()));
            Ok(())
        }
        AdminCommands::Approve { id } => {
            ctx.require(&admin_path(Section::Approvals))?;
            let response = api::admin::approve_user(&ctx.client, *id)
                .await
                .map_err(|e| ctx.fail(e))?;
            print_message(&response, "User approved");
            Ok(())
        }
        AdminCommands::ActivateDriver { id } => {
            ctx.require(&admin_path(Section::Drivers))?;
            let response = api::admin::activate_driver(&ctx.client, *id)
                .await
                .map_err(|e| ctx.fail(e))?;
            print_message(&response, "Driver activated");
            Ok(())
        }
        AdminCommands::ActivateStudent { id } => {
            ctx.require(&admin_path(Section::Students))?;
            let response = api::admin::activate_student(&ctx.client, *id)
                .await
                .map_err(|e| ctx.fail(e))?;
            print_message(&response, "Student activated");
            Ok(())
        }
        AdminCommands::DeleteDriver { id } => {
            ctx.require(&admin_path(Section::Drivers))?;
            let response = api::admin::delete_driver(&ctx.client, *id)
                .await
                .map_err(|e| ctx.fail(e))?;
            print_message(&response, "Driver deleted");
            Ok(())
        }
        AdminCommands::DeleteStudent { id } => {
            ctx.require(&admin_path(Section::Students))?;
            let response = api::admin::delete_student(&ctx.client, *id)
                .await
                .map_err(|e| ctx.fail(e))?;
            print_message(&response, "Student deleted");
            Ok(())
        }
        AdminCommands::DeleteUser { id } => {
            ctx.require(&admin_path(Section::Users))?;
            let response = api::admin::delete_user(&ctx.client, *id)
                .await
                .map_err(|e| ctx.fail(e))?;
            print_message(&response, "User deleted");
            Ok(())
        }
        AdminCommands::SetRole { id, role } => {
            ctx.require(&admin_path(Section::Users))?;
            let response = api::admin::set_role(&ctx.client, *id, *role)
                .await
                .map_err(|e| ctx.fail(e))?;
            print_message(&response, "Role updated");
            Ok(())
        }
        AdminCommands::Dashboard => cmd_admin_dashboard(ctx).await,
        AdminCommands::Analytics => cmd_admin_analytics(ctx).await,
    }
}

async fn cmd_admin_dashboard(ctx: &Context) -> Result<()> {
    ctx.require(&admin_path(Section::Dashboard))?;
    let scope = ViewScope::new();
    let dashboard = AdminDashboard::load(&scope, &ctx.client).await;

    let kpis = dashboard.kpis();
    let pending = match dashboard.pending.take() {
        Loadable::Ready(users) => users,
        Loadable::Failed(e) => return Err(ctx.fail(e)),
        _ => Vec::new(),
    };
    if let Loadable::Failed(e) = dashboard.users.take() {
        return Err(ctx.fail(e));
    }
    let kpis = kpis.ok_or_else(|| anyhow!("Dashboard did not finish loading"))?;

    println!();
    println!("=== Admin Dashboard ===");
    println!();
    println!("Users:      {} ({} active)", kpis.total_users, kpis.active_users);
    println!("Students:   {}", kpis.total_students);
    println!("Drivers:    {} ({} approved)", kpis.total_drivers, kpis.active_drivers);
    let icon = if kpis.pending_approvals == 0 { "[OK]" } else { "[!!]" };
    println!("Pending:    {} {}", icon, kpis.pending_approvals);

    if !pending.is_empty() {
        println!();
        println!("Waiting for approval:");
        for user in pending.iter().take(5) {
            println!("  {:<6} {:<24} {}", user.id, truncate(&user.full_name, 24), user.role());
        }
    }
    println!();
    Ok(())
}

async fn cmd_admin_analytics(ctx: &Context) -> Result<()> {
    ctx.require(&admin_path(Section::Analytics))?;
    let (drivers, rides) = tokio::join!(
        api::admin::all_drivers(&ctx.client),
        api::admin::all_rides(&ctx.client)
    );
    let drivers = drivers.map_err(|e| ctx.fail(e))?;
    let rides = rides.map_err(|e| ctx.fail(e))?;

    let analytics = DriverAnalytics::compute(&drivers);
    println!();
    println!("=== Analytics ===");
    println!();
    println!("Drivers:       {} ({} active)", analytics.total, analytics.active);
    println!(
        "Avg rating:    {:.1} over {} reviews",
        analytics.average_rating, analytics.total_reviews
    );
    print_ride_stats(&RideStats::compute(&rides));

    if !analytics.top_rated.is_empty() {
        println!();
        println!("Top rated:");
        for driver in &analytics.top_rated {
            println!(
                "  {:<24} {:.1} ({} reviews, {} rides)",
                truncate(&driver.name, 24),
                driver.rating,
                driver.total_ratings,
                driver.rides_completed
            );
        }
    }
    println!();
    Ok(())
}

fn print_users(users: &[&User]) {
    if users.is_empty() {
        println!("No users found.");
        return;
    }

    println!();
    println!(
        "{:<6}  {:<24}  {:<30}  {:<8}  {:<10}  {:<12}",
        "ID", "NAME", "EMAIL", "ROLE", "STATUS", "JOINED"
    );
    println!("{}", "-".repeat(100));
    for user in users {
        println!(
            "{:<6}  {:<24}  {:<30}  {:<8}  {:<10}  {:<12}",
            user.id,
            truncate(&user.full_name, 24),
            truncate(&user.email, 30),
            user.role(),
            user.status().as_str(),
            user.created_at.as_deref().map(format_date).unwrap_or_default()
        );
    }
    println!();
}

fn print_drivers(drivers: &[crate::models::DriverSummary]) {
    if drivers.is_empty() {
        println!("No drivers found.");
        return;
    }

    println!();
    println!(
        "{:<6}  {:<24}  {:<20}  {:<10}  {:<8}  {:>6}  {:>7}",
        "ID", "NAME", "VEHICLE", "PLATE", "ACTIVE", "RIDES", "RATING"
    );
    println!("{}", "-".repeat(94));
    for driver in drivers {
        let active = if driver.is_active && driver.is_verified { "[OK]" } else { "[!!]" };
        let rating = if driver.total_ratings > 0 {
            format!("{:.1}", driver.rating)
        } else {
            "-".to_string()
        };
        println!(
            "{:<6}  {:<24}  {:<20}  {:<10}  {:<8}  {:>6}  {:>7}",
            driver.id,
            truncate(&driver.name, 24),
            truncate(driver.vehicle_model.as_deref().unwrap_or("-"), 20),
            driver.vehicle_plate.as_deref().unwrap_or("-"),
            active,
            driver.rides_completed,
            rating
        );
    }
    println!();
}

// ============================================================================
// Notifications
// ============================================================================

async fn cmd_notifications(ctx: &Context, command: &NotificationCommands) -> Result<()> {
    ctx.require_section(Section::Dashboard)?;
    match command {
        NotificationCommands::List => {
            let notifications = api::notifications::list(&ctx.client)
                .await
                .map_err(|e| ctx.fail(e))?;
            if notifications.is_empty() {
                println!("No notifications.");
                return Ok(());
            }
            println!();
            for n in &notifications {
                let marker = if n.is_read { " " } else { "*" };
                let when = n.created_at.as_deref().map(format_date).unwrap_or_default();
                match &n.title {
                    Some(title) => println!("{} {:<6} {:<14} {}: {}", marker, n.id, when, title, n.message),
                    None => println!("{} {:<6} {:<14} {}", marker, n.id, when, n.message),
                }
            }
            let unread = notifications.iter().filter(|n| !n.is_read).count();
            println!();
            println!("{} unread", unread);
            Ok(())
        }
        NotificationCommands::Read { id } => {
            let response = api::notifications::mark_read(&ctx.client, *id)
                .await
                .map_err(|e| ctx.fail(e))?;
            print_message(&response, "Marked as read");
            Ok(())
        }
    }
}

// ============================================================================
// Config
// ============================================================================

fn cmd_config_check(cli: &Cli) -> Result<()> {
    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!();
        println!("Defaults will be used (backend http://localhost:5000).");
        return Ok(());
    }

    match Config::load(config_path) {
        Ok(config) => {
            println!("[OK] Configuration file is valid!");
            println!();
            println!("=== Configuration Summary ===");
            println!();
            println!("API:");
            println!("  Base URL:     {}", config.api.base_url);
            if let Some(url) = &cli.api_url {
                println!("  Overridden:   {} (--api-url / RIDEDESK_API_URL)", url);
            }
            println!();
            println!("Session:");
            println!("  File:         {}", config.session.path.display());
            println!(
                "  Stored:       {}",
                if config.session.path.exists() { "Yes" } else { "No" }
            );
            println!();
            println!("Logging:");
            println!("  Level:        {}", config.logging.level);
            println!();

            if config.api.base_url.starts_with("http://")
                && !config.api.base_url.contains("localhost")
                && !config.api.base_url.contains("127.0.0.1")
            {
                println!("Warnings:");
                println!("  [!] Backend is reached over plain HTTP; the session token is sent unencrypted");
                println!();
            }
            Ok(())
        }
        Err(e) => {
            println!("[!!] Configuration file is invalid!");
            println!();
            println!("Error: {:#}", e);
            println!();
            println!("Please check the configuration file syntax and try again.");
            anyhow::bail!("Invalid configuration file");
        }
    }
}

// ============================================================================
// Formatting helpers
// ============================================================================

/// Render a backend timestamp as `Mar 04, 2025 14:30`, or pass it through
/// unchanged if it is in an unknown format.
fn format_date(raw: &str) -> String {
    const OUT: &str = "%b %d, %Y %H:%M";
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format(OUT).to_string();
    }
    for pattern in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, pattern) {
            return dt.format(OUT).to_string();
        }
    }
    raw.to_string()
}

fn stars(rating: f64) -> String {
    let filled = rating.round().clamp(0.0, 5.0) as usize;
    format!("{}{}", "*".repeat(filled), ".".repeat(5 - filled))
}

/// Truncate a string to max length with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_string_and_json() {
        assert_eq!(
            parse_field("phone=555-0101").unwrap(),
            ("phone".to_string(), Value::String("555-0101".to_string()))
        );
        assert_eq!(
            parse_field("capacity:=4").unwrap(),
            ("capacity".to_string(), serde_json::json!(4))
        );
        assert_eq!(
            parse_field("note=a=b").unwrap().1,
            Value::String("a=b".to_string())
        );
        assert!(parse_field("phone").is_err());
        assert!(parse_field("=x").is_err());
        assert!(parse_field("capacity:=four").is_err());
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2025-03-04 14:30:00"), "Mar 04, 2025 14:30");
        assert_eq!(format_date("2025-03-04T14:30:00Z"), "Mar 04, 2025 14:30");
        assert_eq!(format_date("tomorrow"), "tomorrow");
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Library → North Dorm", 10), "Library...");
        assert_eq!(truncate("ééééééé", 5), "éé...");
    }

    #[test]
    fn test_stars() {
        assert_eq!(stars(4.4), "****.");
        assert_eq!(stars(9.0), "*****");
    }

    #[test]
    fn test_cli_parses_nested_commands() {
        let cli = Cli::try_parse_from([
            "ridedesk",
            "--api-url",
            "http://backend:5000",
            "admin",
            "users",
            "--role",
            "driver",
            "--status",
            "pending",
        ])
        .unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://backend:5000"));
        match cli.command {
            Commands::Admin(AdminCommands::Users { role, status, .. }) => {
                assert_eq!(role, Some(Role::Driver));
                assert_eq!(status, Some(AccountStatus::PendingApproval));
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let cli = Cli::try_parse_from(["ridedesk", "rides", "status", "7", "in_progress"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Rides(RidesCommands::Status { id: 7, status: RideStatus::InProgress })
        ));
        assert!(Cli::try_parse_from(["ridedesk", "rides", "status", "7", "flying"]).is_err());

        let cli = Cli::try_parse_from(["ridedesk", "admin", "delete-user", "5"]).unwrap();
        assert!(matches!(cli.command, Commands::Admin(AdminCommands::DeleteUser { id: 5 })));
        let cli = Cli::try_parse_from(["ridedesk", "admin", "user", "3"]).unwrap();
        assert!(matches!(cli.command, Commands::Admin(AdminCommands::User { id: 3 })));
    }

    #[test]
    fn test_unknown_status_filter_is_a_usage_error() {
        assert!(Cli::try_parse_from(["ridedesk", "rides", "list", "--status", "flying"]).is_err());
        assert!(Cli::try_parse_from(["ridedesk", "admin", "rides", "--status", "flying"]).is_err());

        let cli = Cli::try_parse_from(["ridedesk", "admin", "rides", "--status", "Completed"]).unwrap();
        match cli.command {
            Commands::Admin(AdminCommands::Rides { status, .. }) => {
                assert_eq!(status, Some(RideStatus::Completed));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_blocked_messages_name_the_way_out() {
        assert!(blocked_message(&Screen::RedirectToLogin).contains("ridedesk login"));
        assert!(blocked_message(&Screen::VerifyEmail {
            email: "sam@example.edu".into()
        })
        .contains("sam@example.edu"));
        assert!(blocked_message(&Screen::RedirectToHome {
            path: "/student".into()
        })
        .contains("/student"));
    }
}
