use chrono::{DateTime as ChronoDateTime, NaiveDate, Utc};
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use validator::Validate;

use crate::utils::{ApiError, parse_date, to_chrono};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Company,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Company => "company",
        }
    }
}

/// Fields only a student carries.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct StudentProfile {
    pub firstname: String,
    pub lastname: String,
    pub domain: Option<String>,
    pub search_type: Option<String>, // "stage", "alternance", ...
    pub birth_date: Option<NaiveDate>,
    pub availability_start: Option<NaiveDate>,
    pub availability_end: Option<NaiveDate>,
    pub cv: Option<String>,
    pub motivation_letter: Option<String>,
    /// Actively searching for an internship or apprenticeship.
    #[serde(default)]
    pub searching: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct CompanyProfile {
    pub name: String,
    #[serde(default)]
    pub favorites: Vec<ObjectId>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Profile {
    Student(StudentProfile),
    Company(CompanyProfile),
}

impl Profile {
    pub fn role(&self) -> Role {
        match self {
            Profile::Student(_) => Role::Student,
            Profile::Company(_) => Role::Company,
        }
    }
}

/// A student or a company account. Both live in the `users` collection.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Person {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub password_hash: String,
    pub city: Option<String>,
    pub description: Option<String>,
    pub picture: Option<String>,
    pub profile: Profile,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Person {
    pub fn role(&self) -> Role {
        self.profile.role()
    }

    pub fn display_name(&self) -> String {
        match &self.profile {
            Profile::Student(s) => format!("{} {}", s.firstname, s.lastname),
            Profile::Company(c) => c.name.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupDto {
    pub role: Role,
    #[validate(email(message = "Email is invalid"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub city: Option<String>,
    pub description: Option<String>,
    // Student
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub domain: Option<String>,
    pub search_type: Option<String>,
    pub birth_date: Option<String>,
    // Company
    pub name: Option<String>,
}

fn required(value: &Option<String>, field: &str, label: &str) -> Result<String, ApiError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ApiError::invalid_field(field, format!("{} is required", label))),
    }
}

impl SignupDto {
    /// Builds the role-specific half of the account.
    pub fn profile(&self) -> Result<Profile, ApiError> {
        match self.role {
            Role::Student => {
                let birth_date = self
                    .birth_date
                    .as_deref()
                    .map(|d| parse_date(d, "birthDate"))
                    .transpose()?;

                Ok(Profile::Student(StudentProfile {
                    firstname: required(&self.firstname, "firstname", "First name")?,
                    lastname: required(&self.lastname, "lastname", "Last name")?,
                    domain: self.domain.clone(),
                    search_type: self.search_type.clone(),
                    birth_date,
                    searching: true,
                    ..Default::default()
                }))
            }
            Role::Company => Ok(Profile::Company(CompanyProfile {
                name: required(&self.name, "name", "Company name")?,
                favorites: Vec::new(),
            })),
        }
    }
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SigninDto {
    #[validate(email(message = "Email is invalid"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenDto {
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePersonDto {
    pub city: Option<String>,
    pub description: Option<String>,
    // Student
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub domain: Option<String>,
    pub search_type: Option<String>,
    pub birth_date: Option<String>,
    pub availability_start: Option<String>,
    pub availability_end: Option<String>,
    pub searching: Option<bool>,
    // Company
    pub name: Option<String>,
}

impl UpdatePersonDto {
    /// `$set` document for the caller's variant. Fields belonging to the
    /// other variant are refused rather than silently written.
    pub fn to_update(&self, role: Role) -> Result<mongodb::bson::Document, ApiError> {
        let mut update = mongodb::bson::doc! { "updated_at": DateTime::now() };

        if let Some(ref city) = self.city {
            update.insert("city", city);
        }
        if let Some(ref description) = self.description {
            update.insert("description", description);
        }

        match role {
            Role::Student => {
                if self.name.is_some() {
                    return Err(ApiError::invalid_field("name", "Only companies have a name"));
                }
                for (field, key, value) in [
                    ("firstname", "profile.firstname", &self.firstname),
                    ("lastname", "profile.lastname", &self.lastname),
                ] {
                    if let Some(v) = value {
                        if v.trim().is_empty() {
                            return Err(ApiError::invalid_field(field, format!("{} cannot be empty", field)));
                        }
                        update.insert(key, v.trim());
                    }
                }
                if let Some(ref domain) = self.domain {
                    update.insert("profile.domain", domain);
                }
                if let Some(ref search_type) = self.search_type {
                    update.insert("profile.search_type", search_type);
                }
                if let Some(searching) = self.searching {
                    update.insert("profile.searching", searching);
                }

                let birth_date = self.birth_date.as_deref().map(|d| parse_date(d, "birthDate")).transpose()?;
                let start = self
                    .availability_start
                    .as_deref()
                    .map(|d| parse_date(d, "availabilityStart"))
                    .transpose()?;
                let end = self
                    .availability_end
                    .as_deref()
                    .map(|d| parse_date(d, "availabilityEnd"))
                    .transpose()?;
                if let (Some(s), Some(e)) = (start, end) {
                    if e <= s {
                        return Err(ApiError::invalid_field(
                            "availabilityEnd",
                            "Availability end must be after its start",
                        ));
                    }
                }
                // NaiveDate is stored the way serde writes it: an ISO string
                for (key, value) in [
                    ("profile.birth_date", birth_date),
                    ("profile.availability_start", start),
                    ("profile.availability_end", end),
                ] {
                    if let Some(date) = value {
                        update.insert(key, date.to_string());
                    }
                }
            }
            Role::Company => {
                let student_only = [
                    ("firstname", self.firstname.is_some()),
                    ("lastname", self.lastname.is_some()),
                    ("domain", self.domain.is_some()),
                    ("searchType", self.search_type.is_some()),
                    ("birthDate", self.birth_date.is_some()),
                    ("availabilityStart", self.availability_start.is_some()),
                    ("availabilityEnd", self.availability_end.is_some()),
                    ("searching", self.searching.is_some()),
                ];
                if let Some((field, _)) = student_only.iter().find(|(_, set)| *set) {
                    return Err(ApiError::invalid_field(field, "Only students have this field"));
                }
                if let Some(ref name) = self.name {
                    if name.trim().is_empty() {
                        return Err(ApiError::invalid_field("name", "Company name cannot be empty"));
                    }
                    update.insert("profile.name", name.trim());
                }
            }
        }

        Ok(update)
    }
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum PersonResponse {
    #[serde(rename_all = "camelCase")]
    Student {
        id: String,
        email: String,
        city: Option<String>,
        description: Option<String>,
        picture: Option<String>,
        firstname: String,
        lastname: String,
        domain: Option<String>,
        search_type: Option<String>,
        birth_date: Option<NaiveDate>,
        availability_start: Option<NaiveDate>,
        availability_end: Option<NaiveDate>,
        cv: Option<String>,
        motivation_letter: Option<String>,
        searching: bool,
        created_at: ChronoDateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Company {
        id: String,
        email: String,
        city: Option<String>,
        description: Option<String>,
        picture: Option<String>,
        name: String,
        favorites: Vec<String>,
        created_at: ChronoDateTime<Utc>,
    },
}

impl From<Person> for PersonResponse {
    fn from(person: Person) -> Self {
        let id = person.id.map(|id| id.to_hex()).unwrap_or_default();
        let created_at = to_chrono(person.created_at);

        match person.profile {
            Profile::Student(s) => PersonResponse::Student {
                id,
                email: person.email,
                city: person.city,
                description: person.description,
                picture: person.picture,
                firstname: s.firstname,
                lastname: s.lastname,
                domain: s.domain,
                search_type: s.search_type,
                birth_date: s.birth_date,
                availability_start: s.availability_start,
                availability_end: s.availability_end,
                cv: s.cv,
                motivation_letter: s.motivation_letter,
                searching: s.searching,
                created_at,
            },
            Profile::Company(c) => PersonResponse::Company {
                id,
                email: person.email,
                city: person.city,
                description: person.description,
                picture: person.picture,
                name: c.name,
                favorites: c.favorites.iter().map(|f| f.to_hex()).collect(),
                created_at,
            },
        }
    }
}

#[derive(FromForm, Deserialize, JsonSchema)]
pub struct StudentSearchQuery {
    pub domain: Option<String>,
    pub search_type: Option<String>,
    pub city: Option<String>,
    pub searching: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}
