use super::ReaderError;
use crate::config::Config;
use grammers_client::{Client, Config as ClientConfig, InitParams, SignInError};
use grammers_session::Session;
use std::io::Write;

// Connects and, when the stored session is not authorized yet, drives the
// interactive login flow. The code and the 2FA password can also come from
// the environment for non-interactive setups.
pub async fn connect() -> Result<Client, ReaderError> {
    let session_path = Config::telegram_session_path();

    let session = Session::load_file_or_create(&session_path)
        .map_err(|error| ReaderError {
            msg: format!("failed to load session {}: {:?}", session_path, error),
        })?;

    let client = Client::connect(ClientConfig {
        session,
        api_id: Config::telegram_api_id(),
        api_hash: Config::telegram_api_hash(),
        params: InitParams::default(),
    })
    .await
    .map_err(|error| ReaderError {
        msg: format!("{:?}", error),
    })?;

    let authorized = client.is_authorized().await.map_err(|error| ReaderError {
        msg: format!("{:?}", error),
    })?;

    if !authorized {
        sign_in(&client).await?;

        client
            .session()
            .save_to_file(&session_path)
            .map_err(|error| ReaderError {
                msg: format!("failed to save session {}: {:?}", session_path, error),
            })?;

        log::info!("Signed in, session saved to {}", session_path);
    }

    Ok(client)
}

async fn sign_in(client: &Client) -> Result<(), ReaderError> {
    let phone = Config::telegram_phone();

    let token = client
        .request_login_code(&phone)
        .await
        .map_err(|error| ReaderError {
            msg: format!("{:?}", error),
        })?;

    let code = match Config::telegram_login_code() {
        Some(code) => code,
        None => prompt("Telegram login code: ")?,
    };

    match client.sign_in(&token, &code).await {
        Ok(_) => Ok(()),
        Err(SignInError::PasswordRequired(password_token)) => {
            let password = match Config::telegram_2fa_password() {
                Some(password) => password,
                None => prompt("Telegram 2FA password: ")?,
            };

            client
                .check_password(password_token, password.trim())
                .await
                .map(|_| ())
                .map_err(|error| ReaderError {
                    msg: format!("{:?}", error),
                })
        }
        Err(error) => Err(ReaderError {
            msg: format!("{:?}", error),
        }),
    }
}

fn prompt(message: &str) -> Result<String, ReaderError> {
    print!("{}", message);

    std::io::stdout().flush().map_err(|error| ReaderError {
        msg: format!("{:?}", error),
    })?;

    let mut line = String::new();

    std::io::stdin()
        .read_line(&mut line)
        .map_err(|error| ReaderError {
            msg: format!("{:?}", error),
        })?;

    Ok(line.trim().to_string())
}
