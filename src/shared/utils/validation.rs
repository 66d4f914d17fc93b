use crate::shared::errors::AppError;

pub struct Validator;

impl Validator {
    pub fn validate_game_id(game_id: &str) -> Result<(), AppError> {
        if game_id.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Game id cannot be empty".to_string(),
            ));
        }
        if game_id.len() > 64 {
            return Err(AppError::InvalidInput(
                "Game id too long (max 64 characters)".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_game_name(name: &str) -> Result<(), AppError> {
        if name.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Game name cannot be empty".to_string(),
            ));
        }
        if name.len() > 255 {
            return Err(AppError::InvalidInput(
                "Game name too long (max 255 characters)".to_string(),
            ));
        }
        Ok(())
    }
}
