use crate::error::{StoreError, TaskError, ValidationError};
use crate::models::{NewTask, Task};
use crate::parser::{parse_confirmation, parse_task_id};
use crate::repository::{Deletion, Repository};
use crate::store::TaskStore;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::widgets::ListState;

pub struct App<S: TaskStore> {
    pub repo: Repository<S>,
    pub state: ListState,
    pub task_detail: Option<Task>,
    pub input_mode: InputMode,
    pub active_input: ActiveInput,
    pub new_task: NewTask,
    /// Text typed into the search or go-to-id prompt.
    pub prompt: String,
    pub search: Option<String>,
    /// Task the status picker or delete confirmation is about.
    pub target: Option<Task>,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
    Insert,
    Status,
    ConfirmDelete,
    Search,
    GoTo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveInput {
    Title,
    Description,
    DueDate,
    Priority,
}

impl ActiveInput {
    pub const ALL: [ActiveInput; 4] = [
        ActiveInput::Title,
        ActiveInput::Description,
        ActiveInput::DueDate,
        ActiveInput::Priority,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ActiveInput::Title => "Title",
            ActiveInput::Description => "Description",
            ActiveInput::DueDate => "Due date (DD.MM.YYYY)",
            ActiveInput::Priority => "Priority (1 Low, 2 Medium, 3 High)",
        }
    }

    fn next(self) -> ActiveInput {
        match self {
            ActiveInput::Title => ActiveInput::Description,
            ActiveInput::Description => ActiveInput::DueDate,
            ActiveInput::DueDate => ActiveInput::Priority,
            ActiveInput::Priority => ActiveInput::Title,
        }
    }

    fn previous(self) -> ActiveInput {
        match self {
            ActiveInput::Title => ActiveInput::Priority,
            ActiveInput::Description => ActiveInput::Title,
            ActiveInput::DueDate => ActiveInput::Description,
            ActiveInput::Priority => ActiveInput::DueDate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub level: Level,
}

impl<S: TaskStore> App<S> {
    pub fn new(repo: Repository<S>, load_error: Option<StoreError>) -> App<S> {
        let mut state = ListState::default();
        if !repo.list_tasks().is_empty() {
            state.select(Some(0));
        } else {
            state.select(None);
        }
        let mut app = App {
            repo,
            state,
            task_detail: None,
            input_mode: InputMode::Normal,
            active_input: ActiveInput::Title,
            new_task: NewTask::default(),
            prompt: String::new(),
            search: None,
            target: None,
            message: None,
        };
        if let Some(err) = load_error {
            app.warn(format!("Could not load tasks ({err}). Starting with an empty list."));
        }
        app
    }

    /// Tasks currently shown in the list: everything, or the active search hits.
    pub fn visible_tasks(&self) -> Vec<&Task> {
        match &self.search {
            Some(term) => self.repo.search_tasks(term),
            None => self.repo.list_tasks().iter().collect(),
        }
    }

    pub fn selected_task(&self) -> Option<&Task> {
        let selected = self.state.selected()?;
        self.visible_tasks().get(selected).copied()
    }

    pub fn field(&self, input: ActiveInput) -> &str {
        match input {
            ActiveInput::Title => &self.new_task.title,
            ActiveInput::Description => &self.new_task.description,
            ActiveInput::DueDate => &self.new_task.due_date,
            ActiveInput::Priority => &self.new_task.priority,
        }
    }

    fn field_mut(&mut self, input: ActiveInput) -> &mut String {
        match input {
            ActiveInput::Title => &mut self.new_task.title,
            ActiveInput::Description => &mut self.new_task.description,
            ActiveInput::DueDate => &mut self.new_task.due_date,
            ActiveInput::Priority => &mut self.new_task.priority,
        }
    }

    pub fn next(&mut self) {
        let len = self.visible_tasks().len();
        if len == 0 {
            self.state.select(None);
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i >= len - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible_tasks().len();
        if len == 0 {
            self.state.select(None);
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i == 0 {
                    len - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    fn clamp_selection(&mut self) {
        let len = self.visible_tasks().len();
        let selected = match self.state.selected() {
            _ if len == 0 => None,
            Some(i) => Some(i.min(len - 1)),
            None => Some(0),
        };
        self.state.select(selected);
    }

    fn select_id(&mut self, id: u32) {
        let position = self.visible_tasks().iter().position(|task| task.id == id);
        self.state.select(position);
    }

    fn info(&mut self, text: impl Into<String>) {
        self.message = Some(Message {
            text: text.into(),
            level: Level::Info,
        });
    }

    fn warn(&mut self, text: impl Into<String>) {
        self.message = Some(Message {
            text: text.into(),
            level: Level::Warning,
        });
    }

    fn error(&mut self, text: impl Into<String>) {
        self.message = Some(Message {
            text: text.into(),
            level: Level::Error,
        });
    }

    // A failed save overrides the success message.
    fn report_saved(&mut self, text: String, save_error: Option<StoreError>) {
        match save_error {
            Some(err) => self.warn(format!("{text} Changes are only in memory: {err}")),
            None => self.info(text),
        }
    }

    pub fn show_all(&mut self) {
        self.search = None;
        self.clamp_selection();
        let count = self.repo.list_tasks().len();
        if count == 0 {
            self.info("No tasks yet.");
        } else {
            self.info(format!("Showing all {count} tasks."));
        }
    }

    pub fn select_task(&mut self) {
        let Some(id) = self.selected_task().map(|task| task.id) else {
            self.info("No tasks yet.");
            return;
        };
        self.view_task(id);
    }

    fn view_task(&mut self, id: u32) {
        match self.repo.get_task(id) {
            Ok(task) => {
                self.task_detail = Some(task.clone());
                self.message = None;
            }
            Err(err) => self.error(err.to_string()),
        }
    }

    fn start_add(&mut self) {
        self.new_task = NewTask::default();
        self.active_input = ActiveInput::Title;
        self.input_mode = InputMode::Editing;
        self.info("Press i to type into a field, Tab to switch fields.");
    }

    fn submit_new_task(&mut self) {
        match self.repo.add_task(self.new_task.clone()) {
            Ok(saved) => {
                let task = saved.value;
                self.search = None;
                self.select_id(task.id);
                self.report_saved(format!("'{}' added.", task.title), saved.save_error);
                self.task_detail = Some(task);
                self.new_task = NewTask::default();
                self.input_mode = InputMode::Normal;
            }
            Err(TaskError::Validation(err)) => {
                self.active_input = match err {
                    ValidationError::EmptyTitle => ActiveInput::Title,
                    ValidationError::InvalidDate(_) => ActiveInput::DueDate,
                    ValidationError::InvalidPriority(_) => ActiveInput::Priority,
                    _ => self.active_input,
                };
                self.input_mode = InputMode::Editing;
                self.error(err.to_string());
            }
            Err(err) => self.error(err.to_string()),
        }
    }

    fn start_on_selected(&mut self, mode: InputMode) {
        match self.selected_task().cloned() {
            Some(task) => {
                self.target = Some(task);
                self.input_mode = mode;
                self.message = None;
            }
            None => self.info("No tasks yet."),
        }
    }

    fn choose_status(&mut self, code: &str) {
        let Some(id) = self.target.as_ref().map(|task| task.id) else {
            self.input_mode = InputMode::Normal;
            return;
        };
        match self.repo.update_status(id, code) {
            Ok(saved) => {
                let task = saved.value;
                self.report_saved(format!("Status set to '{}'.", task.status), saved.save_error);
                if self.task_detail.as_ref().is_some_and(|detail| detail.id == task.id) {
                    self.task_detail = Some(task);
                }
                self.target = None;
                self.input_mode = InputMode::Normal;
            }
            Err(TaskError::Validation(_)) => {
                self.error("Invalid choice! Please choose 1-3.");
            }
            Err(err) => {
                self.error(err.to_string());
                self.target = None;
                self.input_mode = InputMode::Normal;
            }
        }
    }

    fn confirm_delete(&mut self, answer: &str) {
        self.input_mode = InputMode::Normal;
        let Some(id) = self.target.take().map(|task| task.id) else {
            return;
        };
        match self.repo.delete_task(id, parse_confirmation(answer)) {
            Ok(saved) => match saved.value {
                Deletion::Removed(task) => {
                    self.task_detail = None;
                    self.clamp_selection();
                    self.report_saved(format!("'{}' deleted.", task.title), saved.save_error);
                }
                Deletion::Cancelled => self.info("Deletion cancelled."),
            },
            Err(err) => self.error(err.to_string()),
        }
    }

    fn start_search(&mut self) {
        if self.repo.list_tasks().is_empty() {
            self.info("No tasks yet.");
            return;
        }
        self.prompt = self.search.clone().unwrap_or_default();
        self.input_mode = InputMode::Search;
    }

    fn apply_search(&mut self) {
        self.input_mode = InputMode::Normal;
        if self.repo.list_tasks().is_empty() {
            self.prompt.clear();
            self.info("No tasks yet.");
            return;
        }
        let term = self.prompt.clone();
        let count = self.repo.search_tasks(&term).len();
        if count == 0 {
            self.info(format!("No tasks match '{term}'."));
        } else {
            self.info(format!("{count} matching tasks."));
        }
        self.search = Some(term);
        self.state.select(None);
        self.clamp_selection();
        self.input_mode = InputMode::Normal;
    }

    fn go_to_id(&mut self) {
        let id = match parse_task_id(&self.prompt) {
            Ok(id) => id,
            Err(err) => {
                self.error(err.to_string());
                self.prompt.clear();
                return;
            }
        };
        self.input_mode = InputMode::Normal;
        match self.repo.get_task(id) {
            Ok(_) => {
                self.search = None;
                self.select_id(id);
                self.view_task(id);
            }
            Err(err) => self.error(err.to_string()),
        }
    }

    /// Handles one key press. Returns `true` when the user asked to quit.
    pub fn handle_input(&mut self, key: KeyEvent) -> bool {
        match self.input_mode {
            InputMode::Normal => match key.code {
                KeyCode::Char('q') | KeyCode::Char('0') => return true,
                KeyCode::Char('j') | KeyCode::Down => self.next(),
                KeyCode::Char('k') | KeyCode::Up => self.previous(),
                KeyCode::Char('1') => self.show_all(),
                KeyCode::Char('a') | KeyCode::Char('2') => self.start_add(),
                KeyCode::Enter | KeyCode::Char('3') => self.select_task(),
                KeyCode::Char('s') | KeyCode::Char('4') => self.start_on_selected(InputMode::Status),
                KeyCode::Char('d') | KeyCode::Char('5') => {
                    self.start_on_selected(InputMode::ConfirmDelete)
                }
                KeyCode::Char('/') | KeyCode::Char('6') => self.start_search(),
                KeyCode::Char('g') => {
                    self.prompt.clear();
                    self.input_mode = InputMode::GoTo;
                }
                KeyCode::Esc => {
                    if self.search.is_some() {
                        self.show_all();
                    }
                }
                _ => {}
            },

            InputMode::Editing => match key.code {
                KeyCode::Char('i') => {
                    self.input_mode = InputMode::Insert;
                }
                KeyCode::Tab | KeyCode::Down => self.active_input = self.active_input.next(),
                KeyCode::BackTab | KeyCode::Up => self.active_input = self.active_input.previous(),
                KeyCode::Enter => self.submit_new_task(),
                KeyCode::Esc => {
                    self.new_task = NewTask::default();
                    self.input_mode = InputMode::Normal;
                    self.info("Add cancelled.");
                }
                _ => {}
            },

            InputMode::Insert => match key.code {
                KeyCode::Char(c) => self.field_mut(self.active_input).push(c),
                KeyCode::Backspace => {
                    self.field_mut(self.active_input).pop();
                }
                KeyCode::Tab => self.active_input = self.active_input.next(),
                KeyCode::BackTab => self.active_input = self.active_input.previous(),
                KeyCode::Esc => {
                    self.input_mode = InputMode::Editing;
                }
                _ => {}
            },

            InputMode::Status => match key.code {
                KeyCode::Esc => {
                    self.target = None;
                    self.input_mode = InputMode::Normal;
                    self.info("Status unchanged.");
                }
                KeyCode::Char(c) => self.choose_status(&c.to_string()),
                _ => self.error("Invalid choice! Please choose 1-3."),
            },

            InputMode::ConfirmDelete => match key.code {
                KeyCode::Char(c) => self.confirm_delete(&c.to_string()),
                _ => self.confirm_delete(""),
            },

            InputMode::Search | InputMode::GoTo => match key.code {
                KeyCode::Char(c) => self.prompt.push(c),
                KeyCode::Backspace => {
                    self.prompt.pop();
                }
                KeyCode::Enter if self.input_mode == InputMode::Search => self.apply_search(),
                KeyCode::Enter => self.go_to_id(),
                KeyCode::Esc => {
                    self.prompt.clear();
                    self.input_mode = InputMode::Normal;
                }
                _ => {}
            },
        }
        false
    }
}
