use rusqlite::Connection;
use tracing::{debug, info};

/// Table definitions in dependency order
const TABLES: &[(&str, &str)] = &[
    (
        "users",
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            full_name TEXT NOT NULL,
            role TEXT NOT NULL,
            phone TEXT,
            region TEXT,
            consultation_fee_cents INTEGER,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    ),
    (
        "appointments",
        "CREATE TABLE IF NOT EXISTS appointments (
            id TEXT PRIMARY KEY,
            patient_id TEXT NOT NULL REFERENCES users(id),
            provider_id TEXT NOT NULL REFERENCES users(id),
            scheduled_at TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL,
            mode TEXT NOT NULL,
            reason TEXT,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    ),
    (
        "invoices",
        "CREATE TABLE IF NOT EXISTS invoices (
            id TEXT PRIMARY KEY,
            appointment_id TEXT NOT NULL REFERENCES appointments(id),
            patient_id TEXT NOT NULL REFERENCES users(id),
            provider_id TEXT NOT NULL REFERENCES users(id),
            amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
            currency TEXT NOT NULL,
            description TEXT,
            status TEXT NOT NULL,
            payment_method TEXT,
            payment_reference TEXT,
            last_payment_error TEXT,
            due_date TEXT,
            paid_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    ),
    (
        "consultation_notes",
        "CREATE TABLE IF NOT EXISTS consultation_notes (
            id TEXT PRIMARY KEY,
            appointment_id TEXT NOT NULL REFERENCES appointments(id),
            provider_id TEXT NOT NULL REFERENCES users(id),
            patient_id TEXT NOT NULL REFERENCES users(id),
            notes_encrypted TEXT NOT NULL,
            diagnosis_encrypted TEXT,
            prescription_encrypted TEXT,
            follow_up_date TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    ),
    (
        "wellness_content",
        "CREATE TABLE IF NOT EXISTS wellness_content (
            id TEXT PRIMARY KEY,
            author_id TEXT NOT NULL REFERENCES users(id),
            title TEXT NOT NULL,
            summary TEXT,
            body TEXT NOT NULL,
            category TEXT NOT NULL,
            media_url TEXT,
            status TEXT NOT NULL,
            published_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    ),
    (
        "assignments",
        "CREATE TABLE IF NOT EXISTS assignments (
            id TEXT PRIMARY KEY,
            educator_id TEXT NOT NULL REFERENCES users(id),
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            due_date TEXT NOT NULL,
            max_score INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    ),
    (
        "submissions",
        "CREATE TABLE IF NOT EXISTS submissions (
            id TEXT PRIMARY KEY,
            assignment_id TEXT NOT NULL REFERENCES assignments(id),
            student_id TEXT NOT NULL REFERENCES users(id),
            content TEXT NOT NULL,
            attachment_url TEXT,
            submitted_at TEXT NOT NULL,
            is_late INTEGER NOT NULL DEFAULT 0,
            score INTEGER,
            feedback TEXT,
            graded_at TEXT,
            graded_by TEXT REFERENCES users(id),
            UNIQUE (assignment_id, student_id)
        )",
    ),
    (
        "surveys",
        "CREATE TABLE IF NOT EXISTS surveys (
            id TEXT PRIMARY KEY,
            created_by TEXT NOT NULL REFERENCES users(id),
            title TEXT NOT NULL,
            description TEXT,
            questions TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    ),
    (
        "survey_responses",
        "CREATE TABLE IF NOT EXISTS survey_responses (
            id TEXT PRIMARY KEY,
            survey_id TEXT NOT NULL REFERENCES surveys(id),
            respondent_id TEXT NOT NULL REFERENCES users(id),
            answers TEXT NOT NULL,
            submitted_at TEXT NOT NULL,
            UNIQUE (survey_id, respondent_id)
        )",
    ),
    (
        "policies",
        "CREATE TABLE IF NOT EXISTS policies (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            version TEXT NOT NULL,
            category TEXT NOT NULL,
            effective_date TEXT NOT NULL,
            created_by TEXT NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL
        )",
    ),
    (
        "policy_acknowledgements",
        "CREATE TABLE IF NOT EXISTS policy_acknowledgements (
            policy_id TEXT NOT NULL REFERENCES policies(id),
            user_id TEXT NOT NULL REFERENCES users(id),
            acknowledged_at TEXT NOT NULL,
            PRIMARY KEY (policy_id, user_id)
        )",
    ),
    (
        "sync_queue",
        "CREATE TABLE IF NOT EXISTS sync_queue (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            client_id TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            operation TEXT NOT NULL,
            payload TEXT NOT NULL,
            status TEXT NOT NULL,
            retry_count INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            client_timestamp TEXT,
            created_at TEXT NOT NULL,
            processed_at TEXT,
            UNIQUE (user_id, client_id)
        )",
    ),
    (
        "audit_logs",
        "CREATE TABLE IF NOT EXISTS audit_logs (
            id TEXT PRIMARY KEY,
            event_type TEXT NOT NULL,
            user_id TEXT,
            success INTEGER NOT NULL,
            resource TEXT,
            details TEXT,
            auth_method TEXT,
            created_at TEXT NOT NULL
        )",
    ),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_users_role ON users (role)",
    "CREATE INDEX IF NOT EXISTS idx_appointments_patient ON appointments (patient_id, scheduled_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_appointments_provider ON appointments (provider_id, scheduled_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_appointments_status ON appointments (status)",
    "CREATE INDEX IF NOT EXISTS idx_invoices_appointment ON invoices (appointment_id)",
    "CREATE INDEX IF NOT EXISTS idx_invoices_patient ON invoices (patient_id)",
    "CREATE INDEX IF NOT EXISTS idx_invoices_provider ON invoices (provider_id)",
    "CREATE INDEX IF NOT EXISTS idx_consultation_notes_patient ON consultation_notes (patient_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_wellness_content_status ON wellness_content (status, category)",
    "CREATE INDEX IF NOT EXISTS idx_assignments_educator ON assignments (educator_id)",
    "CREATE INDEX IF NOT EXISTS idx_submissions_student ON submissions (student_id)",
    "CREATE INDEX IF NOT EXISTS idx_survey_responses_survey ON survey_responses (survey_id)",
    "CREATE INDEX IF NOT EXISTS idx_sync_queue_status ON sync_queue (status, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_audit_logs_created ON audit_logs (created_at DESC)",
];

/// Run SQLite migrations
///
/// Every statement is `IF NOT EXISTS`, so running this against an existing
/// database is a no-op.
pub fn run_migrations(conn: &Connection) -> Result<(), String> {
    info!("Running SQLite migrations");

    for (name, ddl) in TABLES {
        debug!("Creating {} table if not exists", name);
        conn.execute(ddl, [])
            .map_err(|e| format!("Failed to create table {}: {}", name, e))?;
    }

    for ddl in INDEXES {
        conn.execute(ddl, [])
            .map_err(|e| format!("Failed to create index: {}", e))?;
    }

    info!("SQLite migrations completed successfully");
    Ok(())
}
