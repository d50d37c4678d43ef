use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub title: String,
    pub company: String,
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
}
