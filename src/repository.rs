use crate::error::{StoreError, TaskError, ValidationError};
use crate::models::{NewTask, Status, Task, TIMESTAMP_FORMAT};
use crate::parser::{parse_due_date, parse_priority, parse_status};
use crate::store::TaskStore;
use chrono::{Local, NaiveDateTime};
use tracing::{debug, info, warn};

pub type Clock = fn() -> NaiveDateTime;

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Result of a mutation. The change is applied in memory either way;
/// `save_error` is set when writing it to the store failed.
#[derive(Debug)]
pub struct Saved<T> {
    pub value: T,
    pub save_error: Option<StoreError>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Deletion {
    Removed(Task),
    Cancelled,
}

/// Owns the task list. Ids always equal the 1-based list position.
pub struct Repository<S: TaskStore> {
    tasks: Vec<Task>,
    store: S,
    clock: Clock,
}

impl<S: TaskStore> Repository<S> {
    /// Loads the stored tasks. A store that cannot be read or parsed yields an
    /// empty repository; the error is handed back so it can be reported.
    /// Loaded ids are reassigned to list positions, so an edited file with
    /// gaps or duplicates cannot break lookups.
    pub fn open(store: S) -> (Self, Option<StoreError>) {
        let (tasks, load_error) = match store.load() {
            Ok(tasks) => (tasks, None),
            Err(err) => {
                warn!(error = %err, "falling back to an empty task list");
                (Vec::new(), Some(err))
            }
        };
        let mut repo = Repository {
            tasks,
            store,
            clock: local_now,
        };
        if repo.renumber() {
            warn!("stored ids were not 1..N, renumbered them");
        }
        (repo, load_error)
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn add_task(&mut self, input: NewTask) -> Result<Saved<Task>, TaskError> {
        if input.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle.into());
        }
        let due_date = parse_due_date(&input.due_date)?;
        let priority = parse_priority(&input.priority)?;

        let task = Task {
            id: self.next_id(),
            title: input.title,
            description: input.description,
            due_date,
            priority,
            status: Status::Pending,
            created_at: (self.clock)().format(TIMESTAMP_FORMAT).to_string(),
        };
        info!(id = task.id, title = %task.title, "added task");
        self.tasks.push(task.clone());

        Ok(self.persist(task))
    }

    pub fn list_tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get_task(&self, id: u32) -> Result<&Task, TaskError> {
        debug!(id, "looking up task");
        self.tasks
            .iter()
            .find(|task| task.id == id)
            .ok_or(TaskError::NotFound(id))
    }

    pub fn update_status(&mut self, id: u32, status_code: &str) -> Result<Saved<Task>, TaskError> {
        let index = self.position(id)?;
        let status = parse_status(status_code)?;

        let task = &mut self.tasks[index];
        task.status = status;
        info!(id, status = %status, "updated task status");
        let updated = task.clone();

        Ok(self.persist(updated))
    }

    /// Removes a task once the caller has confirmed, then renumbers the rest.
    /// Without confirmation nothing changes and nothing is saved.
    pub fn delete_task(&mut self, id: u32, confirmed: bool) -> Result<Saved<Deletion>, TaskError> {
        let index = self.position(id)?;
        if !confirmed {
            debug!(id, "deletion cancelled");
            return Ok(Saved {
                value: Deletion::Cancelled,
                save_error: None,
            });
        }

        let removed = self.tasks.remove(index);
        self.renumber();
        info!(id, title = %removed.title, remaining = self.tasks.len(), "deleted task");

        Ok(self.persist(Deletion::Removed(removed)))
    }

    pub fn search_tasks(&self, term: &str) -> Vec<&Task> {
        let term = term.to_lowercase();
        let found: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|task| {
                task.title.to_lowercase().contains(&term)
                    || task.description.to_lowercase().contains(&term)
            })
            .collect();
        debug!(term = %term, matches = found.len(), "searched tasks");
        found
    }

    fn next_id(&self) -> u32 {
        self.tasks.len() as u32 + 1
    }

    fn position(&self, id: u32) -> Result<usize, TaskError> {
        self.tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or(TaskError::NotFound(id))
    }

    // Returns whether any id changed.
    fn renumber(&mut self) -> bool {
        let mut changed = false;
        for (i, task) in self.tasks.iter_mut().enumerate() {
            let id = i as u32 + 1;
            changed |= task.id != id;
            task.id = id;
        }
        changed
    }

    fn persist<T>(&self, value: T) -> Saved<T> {
        let save_error = self.store.save(&self.tasks).err();
        if let Some(err) = &save_error {
            warn!(error = %err, "failed to save tasks, keeping them in memory");
        }
        Saved { value, save_error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use crate::store::JsonFileStore;
    use chrono::NaiveDate;
    use std::cell::{Cell, RefCell};
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// In-memory store that records every save and can be told to fail.
    #[derive(Default)]
    struct FakeStore {
        initial: Vec<Task>,
        saved: RefCell<Vec<Vec<Task>>>,
        fail_saves: Cell<bool>,
    }

    impl TaskStore for FakeStore {
        fn load(&self) -> Result<Vec<Task>, StoreError> {
            Ok(self.initial.clone())
        }

        fn save(&self, tasks: &[Task]) -> Result<(), StoreError> {
            if self.fail_saves.get() {
                return Err(StoreError::Write {
                    path: PathBuf::from("tasks.json"),
                    source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
                });
            }
            self.saved.borrow_mut().push(tasks.to_vec());
            Ok(())
        }
    }

    fn fixed_clock() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 28)
            .unwrap()
            .and_hms_opt(9, 5, 42)
            .unwrap()
    }

    fn new_task(title: &str, description: &str) -> NewTask {
        NewTask {
            title: title.to_string(),
            description: description.to_string(),
            due_date: String::new(),
            priority: "2".to_string(),
        }
    }

    fn repo_with(titles: &[&str]) -> Repository<FakeStore> {
        let (mut repo, _) = Repository::open(FakeStore::default());
        repo = repo.with_clock(fixed_clock);
        for title in titles {
            repo.add_task(new_task(title, "")).unwrap();
        }
        repo
    }

    fn ids(repo: &Repository<FakeStore>) -> Vec<u32> {
        repo.list_tasks().iter().map(|task| task.id).collect()
    }

    #[test]
    fn test_add_task_sets_defaults() {
        let mut repo = repo_with(&[]);

        let saved = repo
            .add_task(NewTask {
                title: "Team Meeting".to_string(),
                description: "Weekly".to_string(),
                due_date: "1.3.2024".to_string(),
                priority: "3".to_string(),
            })
            .unwrap();

        let task = saved.value;
        assert!(saved.save_error.is_none());
        assert_eq!(task.id, 1);
        assert_eq!(task.status, Status::Pending);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.due_date, "01.03.2024");
        assert_eq!(task.created_at, "28.02.2024 09:05");
        assert_eq!(repo.list_tasks(), &[task]);
    }

    #[test]
    fn test_add_task_stamps_current_local_time() {
        let (mut repo, _) = Repository::open(FakeStore::default());
        let before = Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string();

        let task = repo.add_task(new_task("Now", "")).unwrap().value;

        let after = Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string();
        assert!(task.created_at == before || task.created_at == after);
    }

    #[test]
    fn test_add_task_persists_full_collection() {
        let repo = repo_with(&["one", "two"]);

        let saves = repo.store().saved.borrow();
        assert_eq!(saves.len(), 2);
        assert_eq!(saves[1], repo.list_tasks());
    }

    #[test]
    fn test_add_task_accepts_empty_due_date() {
        let mut repo = repo_with(&[]);

        let task = repo.add_task(new_task("No deadline", "")).unwrap().value;

        assert_eq!(task.due_date, "");
    }

    #[test]
    fn test_add_task_rejects_invalid_calendar_date() {
        let mut repo = repo_with(&[]);
        let mut input = new_task("Leap", "");
        input.due_date = "31.02.2024".to_string();

        let err = repo.add_task(input).unwrap_err();

        assert_eq!(
            err,
            TaskError::Validation(ValidationError::InvalidDate("31.02.2024".to_string()))
        );
        assert!(repo.list_tasks().is_empty());
        assert!(repo.store().saved.borrow().is_empty());
    }

    #[test]
    fn test_add_task_rejects_unknown_priority() {
        let mut repo = repo_with(&[]);
        let mut input = new_task("Something", "");
        input.priority = "7".to_string();

        assert!(matches!(
            repo.add_task(input),
            Err(TaskError::Validation(ValidationError::InvalidPriority(_)))
        ));
    }

    #[test]
    fn test_add_task_rejects_blank_title() {
        let mut repo = repo_with(&[]);

        assert_eq!(
            repo.add_task(new_task("   ", "desc")).unwrap_err(),
            TaskError::Validation(ValidationError::EmptyTitle)
        );
    }

    #[test]
    fn test_list_tasks_empty() {
        assert!(repo_with(&[]).list_tasks().is_empty());
    }

    #[test]
    fn test_get_task() {
        let repo = repo_with(&["one", "two"]);

        assert_eq!(repo.get_task(2).unwrap().title, "two");
        assert_eq!(repo.get_task(3), Err(TaskError::NotFound(3)));
        assert_eq!(repo.get_task(0), Err(TaskError::NotFound(0)));
    }

    #[test]
    fn test_update_status_changes_only_status() {
        let mut repo = repo_with(&["one", "two"]);
        let before = repo.get_task(2).unwrap().clone();

        let updated = repo.update_status(2, "3").unwrap().value;

        assert_eq!(updated.status, Status::Done);
        assert_eq!(
            updated,
            Task {
                status: Status::Done,
                ..before
            }
        );
        assert_eq!(repo.get_task(2).unwrap(), &updated);
    }

    #[test]
    fn test_update_status_allows_any_transition() {
        let mut repo = repo_with(&["one"]);

        repo.update_status(1, "3").unwrap();
        repo.update_status(1, "1").unwrap();
        let task = repo.update_status(1, "2").unwrap().value;

        assert_eq!(task.status, Status::InProgress);
    }

    #[test]
    fn test_update_status_missing_id() {
        let mut repo = repo_with(&["one"]);
        let before = repo.list_tasks().to_vec();
        let saves = repo.store().saved.borrow().len();

        assert_eq!(
            repo.update_status(999, "2").unwrap_err(),
            TaskError::NotFound(999)
        );
        assert_eq!(repo.list_tasks(), before.as_slice());
        assert_eq!(repo.store().saved.borrow().len(), saves);
    }

    #[test]
    fn test_update_status_invalid_code() {
        let mut repo = repo_with(&["one"]);

        assert_eq!(
            repo.update_status(1, "9").unwrap_err(),
            TaskError::Validation(ValidationError::InvalidStatus("9".to_string()))
        );
        assert_eq!(repo.get_task(1).unwrap().status, Status::Pending);
    }

    #[test]
    fn test_delete_renumbers_remaining_tasks() {
        let mut repo = repo_with(&["first", "second", "third"]);
        let first = repo.get_task(1).unwrap().clone();
        let third = repo.get_task(3).unwrap().clone();

        let saved = repo.delete_task(2, true).unwrap();

        assert!(matches!(saved.value, Deletion::Removed(ref task) if task.title == "second"));
        assert_eq!(
            repo.list_tasks(),
            &[first, Task { id: 2, ..third }]
        );
        assert_eq!(
            repo.store().saved.borrow().last().unwrap(),
            repo.list_tasks()
        );
    }

    #[test]
    fn test_delete_without_confirmation_changes_nothing() {
        let mut repo = repo_with(&["first", "second"]);
        let before = repo.list_tasks().to_vec();
        let saves = repo.store().saved.borrow().len();

        let saved = repo.delete_task(1, false).unwrap();

        assert_eq!(saved.value, Deletion::Cancelled);
        assert_eq!(repo.list_tasks(), before.as_slice());
        assert_eq!(repo.store().saved.borrow().len(), saves);
    }

    #[test]
    fn test_delete_missing_id() {
        let mut repo = repo_with(&["first"]);

        assert_eq!(
            repo.delete_task(5, true).unwrap_err(),
            TaskError::NotFound(5)
        );
        assert_eq!(ids(&repo), vec![1]);
    }

    #[test]
    fn test_ids_stay_contiguous_across_adds_and_deletes() {
        let mut repo = repo_with(&["a", "b", "c", "d", "e"]);

        for (id, next) in [(1, "f"), (4, "g"), (3, "h"), (5, "i")] {
            repo.delete_task(id, true).unwrap();
            let expected: Vec<u32> = (1..=repo.list_tasks().len() as u32).collect();
            assert_eq!(ids(&repo), expected);

            repo.add_task(new_task(next, "")).unwrap();
            let expected: Vec<u32> = (1..=repo.list_tasks().len() as u32).collect();
            assert_eq!(ids(&repo), expected);
        }

        let titles: Vec<&str> = repo.list_tasks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "c", "f", "g", "i"]);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let repo = repo_with(&["Team Meeting", "Groceries"]);

        let found = repo.search_tasks("mEEt");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Team Meeting");
    }

    #[test]
    fn test_search_matches_description_and_keeps_order() {
        let mut repo = repo_with(&[]);
        repo.add_task(new_task("Call mom", "about the trip")).unwrap();
        repo.add_task(new_task("Pack", "nothing")).unwrap();
        repo.add_task(new_task("Book Trip", "")).unwrap();

        let titles: Vec<&str> = repo
            .search_tasks("TRIP")
            .iter()
            .map(|t| t.title.as_str())
            .collect();

        assert_eq!(titles, vec!["Call mom", "Book Trip"]);
    }

    #[test]
    fn test_search_empty_term_returns_everything() {
        let repo = repo_with(&["a", "b", "c"]);

        let found: Vec<Task> = repo.search_tasks("").into_iter().cloned().collect();

        assert_eq!(found, repo.list_tasks());
    }

    #[test]
    fn test_search_without_matches_is_empty() {
        assert!(repo_with(&["a"]).search_tasks("zzz").is_empty());
        assert!(repo_with(&[]).search_tasks("").is_empty());
    }

    #[test]
    fn test_failed_save_keeps_change_in_memory() {
        let mut repo = repo_with(&["one"]);
        repo.store().fail_saves.set(true);

        let saved = repo.add_task(new_task("two", "")).unwrap();

        assert!(matches!(saved.save_error, Some(StoreError::Write { .. })));
        assert_eq!(ids(&repo), vec![1, 2]);

        let saved = repo.delete_task(1, true).unwrap();
        assert!(saved.save_error.is_some());
        assert_eq!(repo.list_tasks()[0].title, "two");
        assert_eq!(repo.list_tasks()[0].id, 1);
    }

    #[test]
    fn test_open_renumbers_ids_with_gaps() {
        let stored = |id, title: &str| Task {
            id,
            title: title.to_string(),
            description: String::new(),
            due_date: String::new(),
            priority: Priority::Low,
            status: Status::Pending,
            created_at: "28.02.2024 09:05".to_string(),
        };
        let store = FakeStore {
            initial: vec![stored(1, "first"), stored(3, "third"), stored(3, "again")],
            ..FakeStore::default()
        };

        let (repo, load_error) = Repository::open(store);
        let mut repo = repo.with_clock(fixed_clock);

        assert!(load_error.is_none());
        assert_eq!(ids(&repo), vec![1, 2, 3]);
        assert_eq!(repo.get_task(3).unwrap().title, "again");

        repo.add_task(new_task("fourth", "")).unwrap();
        assert_eq!(ids(&repo), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_open_renumbers_ids_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        fs::write(
            &path,
            r#"[
    {"id": 1, "title": "a", "description": "", "due_date": "", "priority": "Low", "status": "Pending", "created_at": "28.02.2024 09:05"},
    {"id": 3, "title": "b", "description": "", "due_date": "", "priority": "High", "status": "Done", "created_at": "28.02.2024 09:06"}
]"#,
        )
        .unwrap();

        let (mut repo, _) = Repository::open(JsonFileStore::new(&path));
        let loaded: Vec<u32> = repo.list_tasks().iter().map(|t| t.id).collect();
        assert_eq!(loaded, vec![1, 2]);

        repo.add_task(new_task("c", "")).unwrap();
        let after: Vec<u32> = repo.list_tasks().iter().map(|t| t.id).collect();
        assert_eq!(after, vec![1, 2, 3]);
    }

    #[test]
    fn test_open_falls_back_to_empty_on_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        fs::write(&path, "not json at all").unwrap();

        let (repo, load_error) = Repository::open(JsonFileStore::new(&path));

        assert!(repo.list_tasks().is_empty());
        assert!(matches!(load_error, Some(StoreError::Parse { .. })));
    }

    #[test]
    fn test_open_missing_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();

        let (repo, load_error) = Repository::open(JsonFileStore::new(dir.path().join("tasks.json")));

        assert!(repo.list_tasks().is_empty());
        assert!(load_error.is_none());
    }

    #[test]
    fn test_tasks_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");

        let (mut repo, _) = Repository::open(JsonFileStore::new(&path));
        repo.add_task(new_task("Team Meeting", "Weekly")).unwrap();
        repo.add_task(new_task("Groceries", "")).unwrap();
        repo.update_status(2, "2").unwrap();
        let expected = repo.list_tasks().to_vec();

        let (reopened, load_error) = Repository::open(JsonFileStore::new(&path));

        assert!(load_error.is_none());
        assert_eq!(reopened.list_tasks(), expected.as_slice());
    }
}
