pub mod due_date;
pub mod compiler;
pub mod instantiate;
pub mod cascade;
pub mod dependencies;
pub mod recurrence;

#[cfg(test)]
pub(crate) mod testutil;

pub use cascade::{
    advance_task_status, complete_task, move_project_to_column, project_column, reopen_task,
    CascadeSummary, ColumnTarget,
};
pub use compiler::compile_template;
pub use dependencies::{add_dependency, remove_dependency};
pub use due_date::next_due;
pub use instantiate::{instantiate_project, InstantiateParams};
pub use recurrence::{generate_next_instance, run_recurring_sweep, RecurrenceOutcome, SweepOutcome};
