use crate::client::{GmailClient, GmailClientError};
use crate::token_store::TokenStore;
use crate::types::VacationSettings;

impl<S: TokenStore> GmailClient<S> {
    /// GET /users/me/settings/vacation
    pub async fn get_vacation_settings(&self) -> Result<VacationSettings, GmailClientError> {
        let url = self.url("/users/me/settings/vacation");
        self.send_json(|| self.http().get(&url)).await
    }

    /// PUT /users/me/settings/vacation — full replacement, the server echoes
    /// the stored settings back.
    pub async fn update_vacation_settings(
        &self,
        settings: VacationSettings,
    ) -> Result<VacationSettings, GmailClientError> {
        let url = self.url("/users/me/settings/vacation");
        self.send_json(|| self.http().put(&url).json(&settings))
            .await
    }
}
