use inkpost_common::model::{
    ModelValidationError,
    password::PasswordHash,
    post::Post,
    user::{Email, User, UserAccount},
};
use sqlx::FromRow;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub id: i64,
    pub email: String,
    pub hashed_password: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub id: i64,
    pub text: String,
    pub user_id: i64,
}

impl TryFrom<UserRecord> for UserAccount {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: User {
                id: value.id.into(),
                email: Email::new(value.email)?,
            },
            password_hash: PasswordHash::from_stored(value.hashed_password),
        })
    }
}

impl From<PostRecord> for Post {
    fn from(value: PostRecord) -> Self {
        Self {
            id: value.id.into(),
            text: value.text,
            user_id: value.user_id.into(),
        }
    }
}
