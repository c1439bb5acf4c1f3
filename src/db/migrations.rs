use rusqlite::Connection;

use crate::error::FirmflowError;

pub fn run_migrations(conn: &Connection) -> Result<(), FirmflowError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS firms (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS clients (
            id TEXT PRIMARY KEY,
            firm_id TEXT NOT NULL REFERENCES firms(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1 CHECK (active IN (0, 1)),
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS work_types (
            id TEXT PRIMARY KEY,
            firm_id TEXT NOT NULL REFERENCES firms(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS work_type_stages (
            id TEXT PRIMARY KEY,
            work_type_id TEXT NOT NULL REFERENCES work_types(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            position INTEGER NOT NULL CHECK (position >= 1),
            is_default INTEGER NOT NULL DEFAULT 0 CHECK (is_default IN (0, 1)),
            is_terminal INTEGER NOT NULL DEFAULT 0 CHECK (is_terminal IN (0, 1)),
            UNIQUE (work_type_id, position)
        );

        CREATE TABLE IF NOT EXISTS templates (
            id TEXT PRIMARY KEY,
            firm_id TEXT NOT NULL REFERENCES firms(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            task_dependency_mode INTEGER NOT NULL DEFAULT 0
                CHECK (task_dependency_mode IN (0, 1)),
            work_type_id TEXT REFERENCES work_types(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (firm_id, name)
        );

        CREATE TABLE IF NOT EXISTS template_tasks (
            id TEXT PRIMARY KEY,
            template_id TEXT NOT NULL REFERENCES templates(id) ON DELETE CASCADE,
            position INTEGER NOT NULL CHECK (position >= 1),
            title TEXT NOT NULL,
            description TEXT,
            days_from_start INTEGER,
            recurrence_rule TEXT,
            default_stage_id TEXT REFERENCES work_type_stages(id) ON DELETE SET NULL,
            assignee TEXT,
            priority INTEGER NOT NULL DEFAULT 0,
            estimated_hours REAL,
            CHECK (days_from_start IS NULL OR recurrence_rule IS NULL),
            UNIQUE (template_id, position)
        );

        CREATE TABLE IF NOT EXISTS template_task_dependencies (
            template_task_id TEXT NOT NULL REFERENCES template_tasks(id) ON DELETE CASCADE,
            depends_on_id TEXT NOT NULL REFERENCES template_tasks(id) ON DELETE CASCADE,
            PRIMARY KEY (template_task_id, depends_on_id),
            CHECK (template_task_id != depends_on_id)
        );

        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            firm_id TEXT NOT NULL REFERENCES firms(id) ON DELETE CASCADE,
            work_type_id TEXT NOT NULL REFERENCES work_types(id),
            client_id TEXT NOT NULL REFERENCES clients(id),
            template_id TEXT REFERENCES templates(id) ON DELETE SET NULL,
            name TEXT NOT NULL,
            start_date TEXT NOT NULL,
            due_date TEXT,
            task_dependency_mode INTEGER NOT NULL DEFAULT 0
                CHECK (task_dependency_mode IN (0, 1)),
            current_stage_id TEXT REFERENCES work_type_stages(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            firm_id TEXT NOT NULL REFERENCES firms(id) ON DELETE CASCADE,
            project_id TEXT REFERENCES projects(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            description TEXT,
            stage_id TEXT REFERENCES work_type_stages(id) ON DELETE SET NULL,
            assignee TEXT,
            priority INTEGER NOT NULL DEFAULT 0,
            estimated_hours REAL,
            due_date TEXT,
            template_task_origin_id TEXT REFERENCES template_tasks(id) ON DELETE SET NULL,
            is_recurring INTEGER NOT NULL DEFAULT 0 CHECK (is_recurring IN (0, 1)),
            recurrence_rule TEXT,
            next_due_date TEXT,
            recurring_master_id TEXT REFERENCES tasks(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            completed_at TEXT
        );

        CREATE TABLE IF NOT EXISTS task_dependencies (
            task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            depends_on_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            PRIMARY KEY (task_id, depends_on_id),
            CHECK (task_id != depends_on_id)
        );

        CREATE TABLE IF NOT EXISTS activity_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            firm_id TEXT NOT NULL,
            message TEXT NOT NULL,
            actor TEXT NOT NULL,
            project_id TEXT,
            task_id TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_stages_work_type ON work_type_stages(work_type_id, position);
        CREATE INDEX IF NOT EXISTS idx_template_tasks_template ON template_tasks(template_id, position);
        CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);
        CREATE INDEX IF NOT EXISTS idx_tasks_firm ON tasks(firm_id);
        CREATE INDEX IF NOT EXISTS idx_tasks_sweep ON tasks(firm_id, next_due_date)
            WHERE is_recurring = 1;
        CREATE INDEX IF NOT EXISTS idx_deps_task ON task_dependencies(task_id);
        CREATE INDEX IF NOT EXISTS idx_deps_dep ON task_dependencies(depends_on_id);
        CREATE UNIQUE INDEX IF NOT EXISTS uq_recurring_instance
            ON tasks(recurring_master_id, due_date)
            WHERE recurring_master_id IS NOT NULL;
        ",
    )?;
    Ok(())
}
