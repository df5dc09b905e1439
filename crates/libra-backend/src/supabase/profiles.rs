//! PostgREST implementation of [`ProfileRepository`] over the `users`
//! table.

use libra_core::backend::ProfileRepository;
use libra_core::error::LibraResult;
use libra_core::models::profile::{NewProfile, Profile, ProfileUpdate};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderValue};
use uuid::Uuid;

use super::SupabaseClient;
use super::wire;
use crate::error::BackendError;

const TABLE: &str = "users";

/// Ask PostgREST for a single object instead of an array; zero rows then
/// comes back as 406.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

fn id_filter(id: Uuid) -> [(&'static str, String); 1] {
    [("id", format!("eq.{id}"))]
}

impl ProfileRepository for SupabaseClient {
    async fn get_by_id(&self, id: Uuid) -> LibraResult<Profile> {
        let request = self
            .http
            .get(self.rest_url(TABLE))
            .query(&id_filter(id))
            .query(&[("select", "*")])
            .header(ACCEPT, HeaderValue::from_static(SINGLE_OBJECT));
        let response = self
            .authorized(request)
            .await
            .send()
            .await
            .map_err(BackendError::from)?;

        if response.status() == StatusCode::NOT_ACCEPTABLE {
            return Err(BackendError::NotFound {
                entity: "profile".into(),
                id: id.to_string(),
            }
            .into());
        }
        let response = wire::check(response).await?;
        let profile = response
            .json::<Profile>()
            .await
            .map_err(|e| BackendError::Decode(format!("profile row: {e}")))?;
        Ok(profile)
    }

    async fn create(&self, input: NewProfile) -> LibraResult<Profile> {
        let request = self
            .http
            .post(self.rest_url(TABLE))
            .header("Prefer", "return=representation")
            .header(ACCEPT, HeaderValue::from_static(SINGLE_OBJECT))
            .json(&input);
        let response = self
            .authorized(request)
            .await
            .send()
            .await
            .map_err(BackendError::from)?;
        let response = wire::check(response).await?;
        let profile = response
            .json::<Profile>()
            .await
            .map_err(|e| BackendError::Decode(format!("profile row: {e}")))?;
        Ok(profile)
    }

    async fn update(&self, id: Uuid, input: ProfileUpdate) -> LibraResult<()> {
        let request = self
            .http
            .patch(self.rest_url(TABLE))
            .query(&id_filter(id))
            .header("Prefer", "return=minimal")
            .json(&input);
        let response = self
            .authorized(request)
            .await
            .send()
            .await
            .map_err(BackendError::from)?;
        wire::check(response).await?;
        Ok(())
    }
}
