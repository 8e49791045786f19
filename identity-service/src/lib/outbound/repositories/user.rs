use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;

use crate::domain::context::RequestContext;
use crate::domain::user::models::Bio;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;
use crate::domain::user::ports::UserRepository;
use crate::outbound::store::AttributeUpdate;
use crate::outbound::store::ConditionalPut;
use crate::outbound::store::KeyValueStore;
use crate::outbound::store::Record;
use crate::outbound::store::RecordKey;
use crate::user::errors::UserError;

const USER_PREFIX: &str = "USER#";
const PROFILE_SORT_KEY: &str = "PROFILE";
const USERNAME_PARTITION: &str = "USERNAME";

const USERNAME_ATTR: &str = "un";
const PASSWORD_ATTR: &str = "pw";
const BIO_ATTR: &str = "bio";
const CREATED_AT_ATTR: &str = "ca";
const UPDATED_AT_ATTR: &str = "ua";
const USER_ID_ATTR: &str = "uid";

fn profile_key(id: &UserId) -> RecordKey {
    RecordKey::new(format!("{}{}", USER_PREFIX, id), PROFILE_SORT_KEY)
}

fn reservation_key(username: &Username) -> RecordKey {
    RecordKey::new(USERNAME_PARTITION, username.as_str())
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// User repository over a single-table key-value store.
///
/// Each user is two items: a profile under `USER#<id>` / `PROFILE` and a
/// username reservation under `USERNAME` / `<username>` pointing back at the
/// id. Both are written in one transaction, each conditioned on the key being
/// free, so the reservation is what makes usernames unique.
pub struct KeyValueUserRepository<S>
where
    S: KeyValueStore,
{
    store: Arc<S>,
}

impl<S> KeyValueUserRepository<S>
where
    S: KeyValueStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    fn profile_record(user: &User) -> Record {
        let mut record = Record::new(profile_key(&user.id))
            .with_attribute(USERNAME_ATTR, user.username.as_str())
            .with_attribute(PASSWORD_ATTR, user.password_hash.as_str())
            .with_attribute(CREATED_AT_ATTR, format_timestamp(&user.created_at))
            .with_attribute(UPDATED_AT_ATTR, format_timestamp(&user.updated_at));

        if let Some(bio) = &user.bio {
            record = record.with_attribute(BIO_ATTR, bio.as_str());
        }

        record
    }

    fn reservation_record(user: &User) -> Record {
        Record::new(reservation_key(&user.username))
            .with_attribute(USER_ID_ATTR, user.id.to_string())
    }

    fn user_from_profile(id: UserId, record: &Record) -> Result<User, UserError> {
        let required = |name: &str| {
            record.attribute(name).ok_or_else(|| {
                UserError::Storage(format!(
                    "Profile {} is missing attribute {}",
                    record.key, name
                ))
            })
        };

        let timestamp = |name: &str| -> Result<DateTime<Utc>, UserError> {
            let value = required(name)?;
            DateTime::parse_from_rfc3339(value)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| {
                    UserError::Storage(format!("Profile {} has invalid {}: {}", record.key, name, e))
                })
        };

        let corrupt =
            |e: &dyn std::fmt::Display| UserError::Storage(format!("Profile {}: {}", record.key, e));

        Ok(User {
            id,
            username: Username::new(required(USERNAME_ATTR)?.to_string())
                .map_err(|e| corrupt(&e))?,
            password_hash: required(PASSWORD_ATTR)?.to_string(),
            bio: record
                .attribute(BIO_ATTR)
                .map(|bio| Bio::new(bio.to_string()))
                .transpose()
                .map_err(|e| corrupt(&e))?,
            created_at: timestamp(CREATED_AT_ATTR)?,
            updated_at: timestamp(UPDATED_AT_ATTR)?,
        })
    }
}

#[async_trait]
impl<S> UserRepository for KeyValueUserRepository<S>
where
    S: KeyValueStore,
{
    async fn create(&self, ctx: &RequestContext, user: User) -> Result<User, UserError> {
        let reservation = Self::reservation_record(&user);
        let reservation_key = reservation.key.clone();

        let puts = vec![
            ConditionalPut::if_not_exists(reservation),
            ConditionalPut::if_not_exists(Self::profile_record(&user)),
        ];

        self.store.transact_put(ctx, puts).await.map_err(|e| {
            if e.failed_on(&reservation_key) {
                UserError::UsernameAlreadyExists(user.username.as_str().to_string())
            } else {
                UserError::from(e)
            }
        })?;

        tracing::debug!(user_id = %user.id, username = %user.username, "User records written");

        Ok(user)
    }

    async fn get(&self, ctx: &RequestContext, id: &UserId) -> Result<User, UserError> {
        let record = self
            .store
            .get(ctx, &profile_key(id))
            .await?
            .ok_or_else(|| UserError::NotFound(id.to_string()))?;

        Self::user_from_profile(*id, &record)
    }

    async fn get_by_name(
        &self,
        ctx: &RequestContext,
        username: &Username,
    ) -> Result<User, UserError> {
        let reservation = self
            .store
            .get(ctx, &reservation_key(username))
            .await?
            .ok_or_else(|| UserError::NotFound(username.to_string()))?;

        let id = reservation
            .attribute(USER_ID_ATTR)
            .ok_or_else(|| {
                UserError::Storage(format!("Reservation {} has no user id", reservation.key))
            })
            .and_then(|uid| {
                UserId::from_string(uid).map_err(|e| {
                    UserError::Storage(format!("Reservation {}: {}", reservation.key, e))
                })
            })?;

        self.get(ctx, &id).await.map_err(|e| match e {
            UserError::NotFound(_) => {
                tracing::warn!(user_id = %id, username = %username, "Reservation without profile");
                UserError::NotFound(username.to_string())
            }
            other => other,
        })
    }

    async fn update(&self, ctx: &RequestContext, user: User) -> Result<User, UserError> {
        let key = profile_key(&user.id);

        let mut update =
            AttributeUpdate::new().set(UPDATED_AT_ATTR, format_timestamp(&user.updated_at));
        update = match &user.bio {
            Some(bio) => update.set(BIO_ATTR, bio.as_str()),
            None => update.remove(BIO_ATTR),
        };

        let record = self.store.update(ctx, &key, update).await.map_err(|e| {
            if e.failed_on(&key) {
                UserError::NotFound(user.id.to_string())
            } else {
                UserError::from(e)
            }
        })?;

        Self::user_from_profile(user.id, &record)
    }
}
