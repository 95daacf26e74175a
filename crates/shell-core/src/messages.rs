use serde::{Deserialize, Serialize};

/// User-facing texts shown by the shell. Defaults are the shipped Portuguese strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub load_error_status: String,
    pub load_error_toast: String,
    pub timeout_status: String,
    pub timeout_toast: String,
    pub update_title: String,
    pub update_confirm: String,
    pub update_cancel: String,
    pub package_missing_toast: String,
    pub download_failed_toast: String,
    pub download_title: String,
    pub download_description: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            load_error_status: "Erro ao carregar a página!".to_string(),
            load_error_toast: "Verifique sua conexão e tente novamente.".to_string(),
            timeout_status: "Erro: Tempo limite atingido!".to_string(),
            timeout_toast: "Erro: Tempo limite atingido! Verifique sua conexão e tente novamente"
                .to_string(),
            update_title: "Nova Atualização Disponível".to_string(),
            update_confirm: "Atualizar".to_string(),
            update_cancel: "Cancelar".to_string(),
            package_missing_toast: "Arquivo de atualização não encontrado!".to_string(),
            download_failed_toast: "Falha ao baixar a atualização.".to_string(),
            download_title: "Baixando atualização...".to_string(),
            download_description: "Aguarde o download da nova versão.".to_string(),
        }
    }
}

impl Messages {
    /// Body of the update confirmation dialog.
    pub fn update_body(&self, changelog: &str) -> String {
        format!("Alterações:\n{changelog}\n\nDeseja atualizar agora?")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_body_embeds_changelog() {
        let body = Messages::default().update_body("fix");
        assert_eq!(body, "Alterações:\nfix\n\nDeseja atualizar agora?");
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let messages: Messages =
            serde_json::from_str(r#"{"update_title":"New update"}"#).unwrap();
        assert_eq!(messages.update_title, "New update");
        assert_eq!(messages.update_confirm, "Atualizar");
    }
}
