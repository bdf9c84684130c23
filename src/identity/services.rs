use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, warn};

use crate::error::Error;
use crate::identity::repo::{User, UserStore};

/// Authenticated identity handed over by the external OAuth/OIDC layer.
///
/// A closed set of providers: adding one means adding a variant and letting
/// the compiler point at every match that needs a new arm. Attributes stay
/// optional because upstream providers do omit them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Google {
        sub: Option<String>,
        name: Option<String>,
        email: Option<String>,
    },
    Github {
        id: Option<String>,
        login: Option<String>,
        email: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provider {
    Google,
    Github,
}

/// The attributes every recognized login must carry, checked and normalized.
struct ProviderLogin {
    provider: Provider,
    provider_id: String,
    email: String,
}

impl ProviderLogin {
    /// Provider-id attribute is checked first, then email; a missing field
    /// fails with the name the provider uses for it.
    fn from_principal(principal: &Principal) -> Result<Self, Error> {
        let (provider, provider_id, email) = match principal {
            Principal::Google { sub, email, .. } => {
                let sub = sub.as_deref().ok_or(Error::MissingAttribute("sub"))?;
                (Provider::Google, sub, email)
            }
            Principal::Github { id, email, .. } => {
                let id = id.as_deref().ok_or(Error::MissingAttribute("id"))?;
                (Provider::Github, id, email)
            }
        };
        let email = email.as_deref().ok_or(Error::MissingAttribute("email"))?;
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(Error::MissingAttribute("email"));
        }
        Ok(Self {
            provider,
            provider_id: provider_id.to_string(),
            email,
        })
    }

    fn stored_id<'a>(&self, user: &'a User) -> Option<&'a str> {
        match self.provider {
            Provider::Google => user.google_id.as_deref(),
            Provider::Github => user.github_id.as_deref(),
        }
    }

    fn attach(&self, mut user: User) -> User {
        match self.provider {
            Provider::Google => user.google_id = Some(self.provider_id.clone()),
            Provider::Github => user.github_id = Some(self.provider_id.clone()),
        }
        user
    }

    fn new_user(&self) -> User {
        self.attach(User {
            id: None,
            email: self.email.clone(),
            google_id: None,
            github_id: None,
            created_at: OffsetDateTime::now_utc(),
        })
    }
}

/// Reconciles login principals into canonical user accounts.
///
/// The email is the durable join key across providers; provider ids are
/// additive capabilities on one account. Linking is monotonic: ids are only
/// ever added, never removed or reassigned.
#[derive(Clone)]
pub struct IdentityService {
    store: Arc<dyn UserStore>,
}

impl IdentityService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Resolve a login into its canonical user: create the account on a
    /// first-seen email, link a new provider id into an existing account, or
    /// return the account unchanged.
    pub async fn resolve(&self, principal: &Principal) -> Result<User, Error> {
        let login = ProviderLogin::from_principal(principal)?;

        match self.store.find_by_email(&login.email).await? {
            Some(user) => self.link(user, &login).await,
            None => self.create(&login).await,
        }
    }

    /// Display name for the principal: Google `name`, GitHub `login`.
    pub fn username(&self, principal: &Principal) -> Result<String, Error> {
        match principal {
            Principal::Google { name, .. } => {
                name.clone().ok_or(Error::MissingAttribute("name"))
            }
            Principal::Github { login, .. } => {
                login.clone().ok_or(Error::MissingAttribute("login"))
            }
        }
    }

    /// The already-registered account for a principal, looked up purely by
    /// provider id. Does not create or link anything.
    pub async fn find_for_principal(&self, principal: &Principal) -> Result<Option<User>, Error> {
        let login = ProviderLogin::from_principal(principal)?;
        match login.provider {
            Provider::Google => self.store.find_by_google_id(&login.provider_id).await,
            Provider::Github => self.store.find_by_github_id(&login.provider_id).await,
        }
    }

    async fn create(&self, login: &ProviderLogin) -> Result<User, Error> {
        match self.store.save(login.new_user()).await {
            Ok(created) => {
                info!(email = %login.email, "user created");
                Ok(created)
            }
            Err(Error::Duplicate(msg)) => {
                // Lost the race against a concurrent first login with the
                // same email: the unique index rejected our insert, so the
                // account exists now. Retry the lookup and link into it.
                warn!(email = %login.email, "concurrent first login, retrying lookup");
                match self.store.find_by_email(&login.email).await? {
                    Some(user) => self.link(user, login).await,
                    None => Err(Error::Duplicate(msg)),
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn link(&self, user: User, login: &ProviderLogin) -> Result<User, Error> {
        if login.stored_id(&user).is_some() {
            return Ok(user);
        }

        // Add-only linking: if any account already carries this provider id,
        // leave both records untouched.
        let taken = match login.provider {
            Provider::Google => self.store.find_by_google_id(&login.provider_id).await?,
            Provider::Github => self.store.find_by_github_id(&login.provider_id).await?,
        };
        if taken.is_some() {
            return Ok(user);
        }

        let linked = self.store.save(login.attach(user)).await?;
        info!(email = %linked.email, "provider id linked");
        Ok(linked)
    }
}
