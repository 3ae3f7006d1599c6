use roost_provision::Provisioner;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub provisioner: Provisioner,
    pub config: AppConfig,
}
