//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the database migrations exactly. They are used
//! by Diesel for compile-time query validation and type-safe SQL generation.
//!
//! # Maintenance
//!
//! When migrations change the schema, this file should be regenerated or
//! manually updated to reflect those changes. The `diesel print-schema`
//! command can generate these definitions from a live database.

diesel::table! {
    /// Users that can author or review pull requests.
    users (id) {
        /// Primary key: external user identifier.
        id -> Varchar,
        /// Display name.
        name -> Varchar,
        /// Only active users are eligible as reviewers.
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Teams; names are unique.
    teams (id) {
        id -> Varchar,
        name -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Team membership. Keyed by user, so a user has at most one team.
    team_members (user_id) {
        user_id -> Varchar,
        team_id -> Varchar,
        joined_at -> Timestamptz,
    }
}

diesel::table! {
    /// Pull requests and their lifecycle status (`OPEN` or `MERGED`).
    pull_requests (id) {
        id -> Varchar,
        title -> Varchar,
        author_id -> Varchar,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        /// Set exactly when `status` is `MERGED`.
        merged_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Reviewer assignments; the serial `id` orders them by assignment.
    pull_request_reviewers (id) {
        id -> Int8,
        pull_request_id -> Varchar,
        reviewer_id -> Varchar,
        assigned_at -> Timestamptz,
    }
}

diesel::joinable!(team_members -> users (user_id));
diesel::joinable!(team_members -> teams (team_id));
diesel::joinable!(pull_request_reviewers -> pull_requests (pull_request_id));
diesel::joinable!(pull_request_reviewers -> users (reviewer_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    teams,
    team_members,
    pull_requests,
    pull_request_reviewers,
);
