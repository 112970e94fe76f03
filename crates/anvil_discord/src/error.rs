use anvil_core::CoreError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum DiscordError {
    #[error("No Discord token configured")]
    #[diagnostic(
        code(anvil::discord::missing_token),
        help("Set general.token in the config file, or the ANVIL_TOKEN or DISCORD_TOKEN environment variable")
    )]
    MissingToken,

    #[error("Discord authentication failed")]
    #[diagnostic(
        code(anvil::discord::auth_failed),
        help("Check that your Discord bot token ({token_preview}) is valid and has not been regenerated")
    )]
    AuthenticationFailed {
        #[source]
        cause: serenity::Error,
        token_preview: String,
    },

    #[error("Failed to build the Discord client")]
    #[diagnostic(code(anvil::discord::client_build_failed))]
    ClientBuildFailed {
        #[source]
        cause: serenity::Error,
    },

    #[error("Discord gateway connection failed")]
    #[diagnostic(
        code(anvil::discord::gateway_failed),
        help("The gateway connection closed with an error; check network access and intents")
    )]
    GatewayFailed {
        #[source]
        cause: serenity::Error,
    },

    #[error("Message send failed")]
    #[diagnostic(
        code(anvil::discord::message_send_failed),
        help("Failed to send message to {destination}")
    )]
    MessageSendFailed {
        destination: String,
        message_length: usize,
        #[source]
        cause: serenity::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] CoreError),
}

impl DiscordError {
    pub fn authentication(token: &str, cause: serenity::Error) -> Self {
        Self::AuthenticationFailed {
            cause,
            token_preview: token_preview(token),
        }
    }
}

impl From<DiscordError> for CoreError {
    fn from(err: DiscordError) -> Self {
        match err {
            DiscordError::Core(core) => core,
            other => CoreError::transport("reach Discord", other),
        }
    }
}

/// First and last few characters of a token, enough to tell tokens apart in logs
pub fn token_preview(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 10 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

pub type Result<T> = std::result::Result<T, DiscordError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_preview_hides_the_middle() {
        assert_eq!(token_preview("short"), "*****");
        assert_eq!(
            token_preview("MTIzNDU2Nzg5MDEyMzQ1Njc4.abcdef.ghijkl"),
            "MTIz...ijkl"
        );
    }
}
