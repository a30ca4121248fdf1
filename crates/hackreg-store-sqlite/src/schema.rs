//! SQL schema for the Hackreg SQLite store.
//!
//! Executed once at connection startup. Idempotent thanks to
//! `CREATE TABLE IF NOT EXISTS`; future migrations gate on `user_version`.

pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS people (
    person_id  TEXT PRIMARY KEY,
    handle     TEXT NOT NULL UNIQUE,
    full_name  TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS email_addresses (
    email_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id  TEXT NOT NULL REFERENCES people(person_id),
    address    TEXT NOT NULL UNIQUE,
    verified   INTEGER NOT NULL DEFAULT 0,
    is_primary INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS groups (
    group_id             TEXT PRIMARY KEY,
    name                 TEXT NOT NULL UNIQUE,
    description          TEXT NOT NULL DEFAULT '',
    self_service         INTEGER NOT NULL DEFAULT 0,
    advertise_owners     INTEGER NOT NULL DEFAULT 0,
    owners_manage_owners INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS group_members (
    group_id  TEXT NOT NULL REFERENCES groups(group_id),
    person_id TEXT NOT NULL REFERENCES people(person_id),
    UNIQUE (group_id, person_id)
);

CREATE TABLE IF NOT EXISTS group_owners (
    group_id  TEXT NOT NULL REFERENCES groups(group_id),
    person_id TEXT NOT NULL REFERENCES people(person_id),
    UNIQUE (group_id, person_id)
);

-- One row per person. status is derived; only the service layer writes it.
CREATE TABLE IF NOT EXISTS memberships (
    person_id          TEXT PRIMARY KEY REFERENCES people(person_id),
    real_name          TEXT NOT NULL DEFAULT '',
    display_name       TEXT,
    privacy            INTEGER NOT NULL DEFAULT 1,
    address_street1    TEXT NOT NULL DEFAULT '',
    address_street2    TEXT NOT NULL DEFAULT '',
    address_street3    TEXT NOT NULL DEFAULT '',
    address_locality   TEXT NOT NULL DEFAULT '',
    address_state      TEXT NOT NULL DEFAULT '',
    address_postalcode TEXT NOT NULL DEFAULT '',
    address_country    TEXT NOT NULL DEFAULT '',
    phone              TEXT NOT NULL DEFAULT '',
    membership_number  INTEGER UNIQUE,
    suspended          INTEGER NOT NULL DEFAULT 0,
    status             INTEGER NOT NULL DEFAULT 0,
    notes              TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS membership_terms (
    term_id    TEXT PRIMARY KEY,
    person_id  TEXT NOT NULL REFERENCES people(person_id),
    start_date TEXT NOT NULL,         -- ISO 8601 date
    end_date   TEXT,                  -- NULL means 'does not end'
    kind       INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS mailing_lists (
    name                    TEXT PRIMARY KEY,
    description             TEXT NOT NULL DEFAULT '',
    info                    TEXT NOT NULL DEFAULT '',
    advertised              INTEGER NOT NULL DEFAULT 0,
    subscribe_policy        INTEGER NOT NULL DEFAULT 0,
    archive_private         INTEGER NOT NULL DEFAULT 0,
    subscribe_auto_approval TEXT NOT NULL DEFAULT '',
    auto_unsubscribe        INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS group_policies (
    list_name TEXT NOT NULL REFERENCES mailing_lists(name) ON DELETE CASCADE,
    group_id  TEXT NOT NULL REFERENCES groups(group_id),
    policy    INTEGER NOT NULL DEFAULT 0,
    prompt    TEXT NOT NULL DEFAULT '',
    UNIQUE (list_name, group_id)
);

CREATE TABLE IF NOT EXISTS address_changes (
    change_id INTEGER PRIMARY KEY AUTOINCREMENT,
    created   TEXT NOT NULL,
    person_id TEXT NOT NULL REFERENCES people(person_id),
    old_email TEXT NOT NULL,
    new_email TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS posix_users (
    person_id TEXT PRIMARY KEY REFERENCES people(person_id),
    uid       INTEGER NOT NULL UNIQUE,
    shell     TEXT NOT NULL DEFAULT '/bin/bash',
    password  TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS posix_groups (
    group_id TEXT PRIMARY KEY REFERENCES groups(group_id),
    gid      INTEGER NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS ssh_keys (
    key_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id TEXT NOT NULL REFERENCES people(person_id),
    key       TEXT NOT NULL,
    comment   TEXT NOT NULL DEFAULT '',
    enabled   INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS nfc_tokens (
    token_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id   TEXT REFERENCES people(person_id),
    uid         TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    enabled     INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS api_keys (
    key_id  TEXT PRIMARY KEY,
    name    TEXT NOT NULL,
    secret  TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS email_person_idx ON email_addresses(person_id);
CREATE INDEX IF NOT EXISTS terms_person_idx ON membership_terms(person_id);
CREATE INDEX IF NOT EXISTS members_group_idx ON group_members(group_id);
CREATE INDEX IF NOT EXISTS policies_list_idx ON group_policies(list_name);

PRAGMA user_version = 1;
";
