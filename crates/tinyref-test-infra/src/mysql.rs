use crate::Result;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use typed_builder::TypedBuilder;

/// Credentials and image selection for a disposable MySQL server.
///
/// The defaults give every test run its own throwaway database named
/// after the project; override them only when a test needs to exercise
/// credential handling itself.
#[derive(TypedBuilder)]
pub struct MysqlConfig {
    #[builder(default = "tinyref".to_string())]
    database: String,
    #[builder(default = "tinyref".to_string())]
    username: String,
    #[builder(default = "tinyref".to_string())]
    password: String,
    #[builder(default = "root".to_string())]
    root_password: String,
    #[builder(default = "8.4".to_string())]
    image_tag: String,
}

/// A MySQL server running in a container, torn down on drop.
///
/// Note that the container reporting "ready for connections" does not
/// guarantee the first client connection succeeds; callers should still
/// retry the initial connect.
pub struct MySqlServer {
    container: ContainerAsync<GenericImage>,
    config: MysqlConfig,
}

impl MySqlServer {
    /// Starts a server with the given configuration.
    pub async fn start(config: MysqlConfig) -> Result<Self> {
        let container = GenericImage::new("mysql", &config.image_tag)
            .with_exposed_port(3306_u16.tcp())
            .with_wait_for(WaitFor::message_on_stderr("ready for connections"))
            .with_env_var("MYSQL_DATABASE", config.database.as_str())
            .with_env_var("MYSQL_USER", config.username.as_str())
            .with_env_var("MYSQL_PASSWORD", config.password.as_str())
            .with_env_var("MYSQL_ROOT_PASSWORD", config.root_password.as_str())
            .start()
            .await?;

        Ok(Self { container, config })
    }

    /// Starts a server with the default configuration.
    pub async fn with_defaults() -> Result<Self> {
        Self::start(MysqlConfig::builder().build()).await
    }

    /// Connection URL for the configured (non-root) user.
    pub async fn database_url(&self) -> Result<String> {
        let host = self.container.get_host().await?;
        let port = self.container.get_host_port_ipv4(3306).await?;
        Ok(format!(
            "mysql://{}:{}@{}:{}/{}",
            self.config.username, self.config.password, host, port, self.config.database
        ))
    }

    /// Connection URL for the root account, for tests that need DDL
    /// privileges beyond the configured user's grants.
    pub async fn root_url(&self) -> Result<String> {
        let host = self.container.get_host().await?;
        let port = self.container.get_host_port_ipv4(3306).await?;
        Ok(format!(
            "mysql://root:{}@{}:{}/{}",
            self.config.root_password, host, port, self.config.database
        ))
    }
}
