use std::env;

/// Overrides environment variables until dropped, then puts the previous values back.
///
/// Tests holding one must be `#[serial]`; the process environment is shared.
pub struct EnvOverride {
    previous: Vec<(String, Option<String>)>,
}

impl EnvOverride {
    /// Sets each `Some` value and removes each `None` key.
    pub fn new(vars: &[(&str, Option<&str>)]) -> Self {
        let previous = vars
            .iter()
            .map(|(key, value)| {
                let old = env::var(key).ok();
                apply(key, *value);
                (key.to_string(), old)
            })
            .collect();
        Self {
            previous,
        }
    }
}

impl Drop for EnvOverride {
    fn drop(&mut self) {
        for (key, value) in self.previous.drain(..).rev() {
            apply(&key, value.as_deref());
        }
    }
}

fn apply(key: &str, value: Option<&str>) {
    match value {
        Some(value) => env::set_var(key, value),
        None => env::remove_var(key),
    }
}
