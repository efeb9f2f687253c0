//! Directory repositories: people, organizations, projects and users.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;

use biblio_core::{
    Error, Organization, OrganizationService, Person, PersonService, Project, ProjectService,
    Result, User, UserService,
};

use crate::escape_like;

/// Hex encoded SHA-256 of an API key, as stored in `users.api_key_hash`.
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

fn like_pattern(query: &str) -> String {
    format!("%{}%", escape_like(query.trim()))
}

// =============================================================================
// PEOPLE
// =============================================================================

const PERSON_COLUMNS: &str =
    "id, first_name, last_name, full_name, orcid, orcid_token, email, active, affiliations";

fn person_from_row(row: &PgRow) -> Result<Person> {
    Ok(Person {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        full_name: row.try_get("full_name")?,
        orcid: row.try_get("orcid")?,
        orcid_token: row.try_get("orcid_token")?,
        email: row.try_get("email")?,
        active: row.try_get("active")?,
        affiliations: row.try_get("affiliations")?,
    })
}

/// PostgreSQL implementation of [`PersonService`].
pub struct PgPersonRepository {
    pool: Pool<Postgres>,
}

impl PgPersonRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert or replace a person.
    pub async fn upsert(&self, person: &Person) -> Result<()> {
        sqlx::query(
            "INSERT INTO people (id, first_name, last_name, full_name, orcid, orcid_token, email, active, affiliations)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (id) DO UPDATE SET
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                full_name = EXCLUDED.full_name,
                orcid = EXCLUDED.orcid,
                orcid_token = COALESCE(EXCLUDED.orcid_token, people.orcid_token),
                email = EXCLUDED.email,
                active = EXCLUDED.active,
                affiliations = EXCLUDED.affiliations",
        )
        .bind(&person.id)
        .bind(&person.first_name)
        .bind(&person.last_name)
        .bind(&person.full_name)
        .bind(&person.orcid)
        .bind(&person.orcid_token)
        .bind(&person.email)
        .bind(person.active)
        .bind(&person.affiliations)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}

#[async_trait]
impl PersonService for PgPersonRepository {
    async fn get_person(&self, id: &str) -> Result<Option<Person>> {
        let row = sqlx::query(&format!("SELECT {} FROM people WHERE id = $1", PERSON_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(person_from_row).transpose()
    }

    async fn get_people(&self, ids: &[String]) -> Result<Vec<Person>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {} FROM people WHERE id = ANY($1)",
            PERSON_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut people = rows
            .iter()
            .map(person_from_row)
            .collect::<Result<Vec<_>>>()?;
        people.sort_by_key(|p| ids.iter().position(|id| *id == p.id));
        Ok(people)
    }

    async fn suggest_people(&self, query: &str, limit: i64) -> Result<Vec<Person>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM people
             WHERE active AND (full_name ILIKE $1 OR id = $2 OR orcid = $2)
             ORDER BY last_name, first_name
             LIMIT $3",
            PERSON_COLUMNS
        ))
        .bind(like_pattern(query))
        .bind(query.trim())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "directory",
            op = "suggest_people",
            result_count = rows.len(),
            "Suggested people"
        );
        rows.iter().map(person_from_row).collect()
    }

    async fn set_orcid_token(&self, id: &str, orcid: &str, token: &str) -> Result<()> {
        let result = sqlx::query("UPDATE people SET orcid = $2, orcid_token = $3 WHERE id = $1")
            .bind(id)
            .bind(orcid)
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("person {}", id)));
        }
        Ok(())
    }
}

// =============================================================================
// ORGANIZATIONS
// =============================================================================

fn organization_from_row(row: &PgRow) -> Result<Organization> {
    let kind: String = row.try_get("kind")?;
    Ok(Organization {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        parent_id: row.try_get("parent_id")?,
        kind: kind.parse()?,
    })
}

/// PostgreSQL implementation of [`OrganizationService`].
pub struct PgOrganizationRepository {
    pool: Pool<Postgres>,
}

impl PgOrganizationRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert or replace an organization.
    pub async fn upsert(&self, org: &Organization) -> Result<()> {
        sqlx::query(
            "INSERT INTO organizations (id, name, parent_id, kind) VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name, parent_id = EXCLUDED.parent_id, kind = EXCLUDED.kind",
        )
        .bind(&org.id)
        .bind(&org.name)
        .bind(&org.parent_id)
        .bind(org.kind.as_str())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}

#[async_trait]
impl OrganizationService for PgOrganizationRepository {
    async fn get_organization(&self, id: &str) -> Result<Option<Organization>> {
        let row =
            sqlx::query("SELECT id, name, parent_id, kind FROM organizations WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;
        row.as_ref().map(organization_from_row).transpose()
    }

    async fn suggest_organizations(&self, query: &str, limit: i64) -> Result<Vec<Organization>> {
        let rows = sqlx::query(
            "SELECT id, name, parent_id, kind FROM organizations
             WHERE name ILIKE $1 OR id ILIKE $1
             ORDER BY name
             LIMIT $2",
        )
        .bind(like_pattern(query))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.iter().map(organization_from_row).collect()
    }

    async fn organization_tree(&self, id: &str) -> Result<Vec<Organization>> {
        let rows = sqlx::query(
            "WITH RECURSIVE chain AS (
                SELECT id, name, parent_id, kind, 0 AS depth FROM organizations WHERE id = $1
                UNION ALL
                SELECT o.id, o.name, o.parent_id, o.kind, c.depth + 1
                FROM organizations o JOIN chain c ON o.id = c.parent_id
                WHERE c.depth < 32
             )
             SELECT id, name, parent_id, kind FROM chain ORDER BY depth",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut chain: Vec<Organization> = Vec::with_capacity(rows.len());
        for row in &rows {
            let org = organization_from_row(row)?;
            if chain.iter().any(|o| o.id == org.id) {
                break;
            }
            chain.push(org);
        }
        Ok(chain)
    }
}

// =============================================================================
// PROJECTS
// =============================================================================

fn project_from_row(row: &PgRow) -> Result<Project> {
    Ok(Project {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        acronym: row.try_get("acronym")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
    })
}

/// PostgreSQL implementation of [`ProjectService`].
pub struct PgProjectRepository {
    pool: Pool<Postgres>,
}

impl PgProjectRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert or replace a project.
    pub async fn upsert(&self, project: &Project) -> Result<()> {
        sqlx::query(
            "INSERT INTO projects (id, title, acronym, start_date, end_date) VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title, acronym = EXCLUDED.acronym,
                start_date = EXCLUDED.start_date, end_date = EXCLUDED.end_date",
        )
        .bind(&project.id)
        .bind(&project.title)
        .bind(&project.acronym)
        .bind(project.start_date)
        .bind(project.end_date)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}

#[async_trait]
impl ProjectService for PgProjectRepository {
    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        let row = sqlx::query(
            "SELECT id, title, acronym, start_date, end_date FROM projects WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.as_ref().map(project_from_row).transpose()
    }

    async fn suggest_projects(&self, query: &str, limit: i64) -> Result<Vec<Project>> {
        let rows = sqlx::query(
            "SELECT id, title, acronym, start_date, end_date FROM projects
             WHERE title ILIKE $1 OR acronym ILIKE $1
             ORDER BY start_date DESC NULLS LAST, title
             LIMIT $2",
        )
        .bind(like_pattern(query))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.iter().map(project_from_row).collect()
    }
}

// =============================================================================
// USERS
// =============================================================================

const USER_COLUMNS: &str = "id, username, full_name, email, role, person_id";

fn user_from_row(row: &PgRow) -> Result<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        role: role.parse()?,
        person_id: row.try_get("person_id")?,
    })
}

/// PostgreSQL implementation of [`UserService`].
pub struct PgUserRepository {
    pool: Pool<Postgres>,
}

impl PgUserRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert or replace a user; `api_key` is stored hashed.
    pub async fn upsert(&self, user: &User, api_key: Option<&str>) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, username, full_name, email, role, person_id, api_key_hash)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id) DO UPDATE SET
                username = EXCLUDED.username, full_name = EXCLUDED.full_name,
                email = EXCLUDED.email, role = EXCLUDED.role, person_id = EXCLUDED.person_id,
                api_key_hash = COALESCE(EXCLUDED.api_key_hash, users.api_key_hash)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(&user.person_id)
        .bind(api_key.map(hash_api_key))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn find_by(&self, column: &str, value: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE {} = $1",
            USER_COLUMNS, column
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.as_ref().map(user_from_row).transpose()
    }
}

#[async_trait]
impl UserService for PgUserRepository {
    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.find_by("id", id).await
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.find_by("username", username).await
    }

    async fn get_user_by_api_key_hash(&self, key_hash: &str) -> Result<Option<User>> {
        self.find_by("api_key_hash", key_hash).await
    }
}
