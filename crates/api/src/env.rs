use academy_common::{env_or, EnvVars};

pub const DEFAULT_PORT: &str = "3033";

pub struct ApiServerEnv {
    /// Shared secret for the admin routes. Empty locks them.
    pub draw_password: String,
    pub port: String,
}

impl EnvVars for ApiServerEnv {
    fn load() -> Self {
        Self {
            draw_password: env_or("DRAW_PASSWORD", ""),
            port: env_or("PORT", DEFAULT_PORT),
        }
    }

    fn get_env_var(&self, key: &str) -> String {
        match key {
            "DRAW_PASSWORD" => self.draw_password.clone(),
            "PORT" => self.port.clone(),
            _ => panic!("{} is not set", key),
        }
    }
}
