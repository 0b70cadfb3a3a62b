//! Login, registration and world download steps for the data loader.

use fw_platform::storage::load_string;
use fw_platform::transport::{ERROR_MARKER, SUCCESS_MARKER};
use fw_platform::{Request, Storage, Transport};

use crate::loader::{LoaderSteps, StepResult, View};
use crate::world::{cache_world, json_data_path, parse_world_list, split_world_payload, WORLD_LIST_PATH};

pub const USERNAME_KEY: &str = "Flip-Social-Username";
pub const PASSWORD_KEY: &str = "Flip-Social-Password";
pub const LOGGED_IN_KEY: &str = "is_logged_in";

const USER_FOUND: &str = "User found";
const USER_NOT_FOUND: &str = "User not found";
const USER_CREATED: &str = "User created";
const USER_EXISTS: &str = "User already exists";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountStep {
    Login,
    Register,
    WorldList,
    World(String),
}

pub struct AccountSteps {
    store: Box<dyn Storage>,
    base_url: String,
    steps: Vec<AccountStep>,
}

impl AccountSteps {
    pub fn new(store: Box<dyn Storage>, base_url: impl Into<String>, steps: Vec<AccountStep>) -> Self {
        Self {
            store,
            base_url: base_url.into(),
            steps,
        }
    }

    /// Log in, then refresh the world list and any uncached worlds.
    pub fn login_flow(store: Box<dyn Storage>, base_url: impl Into<String>) -> Self {
        Self::new(store, base_url, vec![AccountStep::Login, AccountStep::WorldList])
    }

    /// Refresh the world list without logging in.
    pub fn world_list_flow(store: Box<dyn Storage>, base_url: impl Into<String>) -> Self {
        Self::new(store, base_url, vec![AccountStep::WorldList])
    }

    fn url(&self, route: &str) -> String {
        format!("{}/{route}", self.base_url.trim_end_matches('/'))
    }

    fn credentials(&self) -> Option<(String, String)> {
        let username = load_string(self.store.as_ref(), USERNAME_KEY).ok()?;
        let password = load_string(self.store.as_ref(), PASSWORD_KEY).ok()?;
        if username.is_empty() || password.is_empty() {
            return None;
        }
        Some((username, password))
    }

    fn credential_payload(&self) -> Option<String> {
        let (username, password) = self.credentials()?;
        Some(serde_json::json!({ "username": username, "password": password }).to_string())
    }

    fn set_logged_in(&mut self, logged_in: bool) {
        if let Err(e) = self.store.save(LOGGED_IN_KEY, if logged_in { "true" } else { "false" }) {
            log::error!("Failed to save login state: {e}");
        }
    }

    fn parse_login(&mut self, step: usize, response: &str) -> StepResult {
        if response.contains(USER_NOT_FOUND) {
            log::info!("Account not found, registering");
            self.steps.insert(step + 1, AccountStep::Register);
            return StepResult::Parsed("Account not found. Registering...".to_string());
        }
        if response.contains(USER_FOUND) || response.contains(SUCCESS_MARKER) {
            self.set_logged_in(true);
            return StepResult::Parsed("Logged in!".to_string());
        }
        self.set_logged_in(false);
        StepResult::Failed(failure_text("Login failed", response))
    }

    fn parse_register(&mut self, response: &str) -> StepResult {
        if response.contains(USER_EXISTS) {
            log::warn!("Registration refused: username taken");
            return StepResult::Redirect(View::MainMenu);
        }
        if response.contains(USER_CREATED) || response.contains(SUCCESS_MARKER) {
            self.set_logged_in(true);
            return StepResult::Parsed("Account created!".to_string());
        }
        StepResult::Failed(failure_text("Registration failed", response))
    }

    fn parse_worlds(&mut self, response: &str) -> StepResult {
        let levels = match parse_world_list(response) {
            Ok(levels) => levels,
            Err(e) => return StepResult::Failed(e),
        };
        if let Err(e) = self.store.write_file(WORLD_LIST_PATH, response) {
            return StepResult::Failed(format!("Failed to save world list: {e}"));
        }
        let mut queued = 0;
        for level in &levels {
            if !self.store.file_exists(&json_data_path(&level.id)) {
                self.steps.push(AccountStep::World(level.id.clone()));
                queued += 1;
            }
        }
        log::info!("World list has {} worlds, {queued} to download", levels.len());
        StepResult::Parsed(format!("{} worlds available", levels.len()))
    }

    fn parse_world(&mut self, id: &str, response: &str) -> StepResult {
        let cached = split_world_payload(response)
            .and_then(|docs| cache_world(self.store.as_mut(), id, &docs));
        match cached {
            Ok(()) => StepResult::Parsed(format!("Downloaded {id}")),
            Err(e) => StepResult::Failed(format!("Failed to parse world JSON {id}: {e}")),
        }
    }
}

fn failure_text(context: &str, response: &str) -> String {
    let detail = response.trim();
    if detail.starts_with(ERROR_MARKER) {
        format!("{context}. {detail}")
    } else {
        format!("{context}. Unexpected response.")
    }
}

impl LoaderSteps for AccountSteps {
    fn step_count(&self) -> usize {
        self.steps.len()
    }

    fn fetch(&mut self, step: usize, transport: &mut dyn Transport) -> bool {
        let Some(kind) = self.steps.get(step).cloned() else {
            return false;
        };
        let request = match &kind {
            AccountStep::Login | AccountStep::Register => {
                let Some(payload) = self.credential_payload() else {
                    log::warn!("No stored credentials for {kind:?}");
                    return false;
                };
                let route = if kind == AccountStep::Login {
                    "user/login"
                } else {
                    "user/register"
                };
                Request::post(self.url(route), payload)
            }
            AccountStep::WorldList => Request::get(self.url("world/list/10"))
                .save_to(self.store.file_path(WORLD_LIST_PATH)),
            AccountStep::World(id) => Request::get(self.url(&format!("world/get/world/{id}"))),
        };
        match transport.request(request) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to send {kind:?} request: {e}");
                false
            }
        }
    }

    fn parse(&mut self, step: usize, response: &str) -> StepResult {
        match self.steps.get(step).cloned() {
            Some(AccountStep::Login) => self.parse_login(step, response),
            Some(AccountStep::Register) => self.parse_register(response),
            Some(AccountStep::WorldList) => self.parse_worlds(response),
            Some(AccountStep::World(id)) => self.parse_world(&id, response),
            None => StepResult::Failed(format!("No step {step}")),
        }
    }
}
