//! The `ldap3`-backed [`DirectoryClient`].

use std::collections::HashSet;

use ldap3::{
  Ldap, LdapConnAsync, LdapConnSettings, LdapError, Mod as LdapMod, Scope,
  SearchEntry,
};

use crate::{
  entry::{Attrs, Mod},
  sync::DirectoryClient,
  Result,
};

/// LDAP result code for "no such object".
const NO_SUCH_OBJECT: u32 = 32;

/// Connection parameters for the directory server.
#[derive(Debug, Clone, Default)]
pub struct LdapConfig {
  /// `ldap://` or `ldaps://` URL.
  pub url:           String,
  /// Empty means anonymous bind.
  pub bind_dn:       String,
  pub bind_password: String,
  pub starttls:      bool,
  pub no_tls_verify: bool,
}

/// A bound connection to the directory server.
pub struct LdapDirectory {
  ldap:    Ldap,
  bind_dn: String,
}

impl LdapDirectory {
  pub async fn connect(cfg: &LdapConfig) -> Result<Self> {
    let settings = LdapConnSettings::new()
      .set_starttls(cfg.starttls)
      .set_no_tls_verify(cfg.no_tls_verify);
    let (conn, mut ldap) =
      LdapConnAsync::with_settings(settings, &cfg.url).await?;
    ldap3::drive!(conn);

    if !cfg.bind_dn.is_empty() {
      ldap
        .simple_bind(&cfg.bind_dn, &cfg.bind_password)
        .await?
        .success()?;
    }

    Ok(Self { ldap, bind_dn: cfg.bind_dn.clone() })
  }

  /// The DN this connection is bound as; empty for anonymous.
  pub fn bound_as(&self) -> &str { &self.bind_dn }

  pub async fn unbind(&mut self) -> Result<()> {
    self.ldap.unbind().await?;
    Ok(())
  }
}

impl DirectoryClient for LdapDirectory {
  async fn lookup(&mut self, dn: &str) -> Result<Option<Attrs>> {
    let search = self
      .ldap
      .search(dn, Scope::Base, "(objectClass=*)", vec!["*"])
      .await?;
    match search.success() {
      Ok((entries, _)) => Ok(entries.into_iter().next().map(|e| {
        SearchEntry::construct(e).attrs.into_iter().collect()
      })),
      Err(LdapError::LdapResult { result }) if result.rc == NO_SUCH_OBJECT => {
        Ok(None)
      }
      Err(e) => Err(e.into()),
    }
  }

  async fn add(&mut self, dn: &str, entry: &Attrs) -> Result<()> {
    let attrs: Vec<(String, HashSet<String>)> = entry
      .iter()
      .map(|(attr, values)| (attr.clone(), values.iter().cloned().collect()))
      .collect();
    self.ldap.add(dn, attrs).await?.success()?;
    Ok(())
  }

  async fn modify(&mut self, dn: &str, mods: &[Mod]) -> Result<()> {
    let changes: Vec<LdapMod<String>> = mods
      .iter()
      .map(|m| match m {
        Mod::Replace(attr, values) => {
          LdapMod::Replace(attr.clone(), values.iter().cloned().collect())
        }
        Mod::Delete(attr) => LdapMod::Delete(attr.clone(), HashSet::new()),
        Mod::Add(attr, values) => {
          LdapMod::Add(attr.clone(), values.iter().cloned().collect())
        }
      })
      .collect();
    self.ldap.modify(dn, changes).await?.success()?;
    Ok(())
  }

  async fn delete(&mut self, dn: &str) -> Result<()> {
    self.ldap.delete(dn).await?.success()?;
    Ok(())
  }

  async fn list_subtree(&mut self, base_dn: &str) -> Result<Vec<String>> {
    let search = self
      .ldap
      .search(base_dn, Scope::Subtree, "(objectClass=*)", Vec::<String>::new())
      .await?;
    match search.success() {
      Ok((entries, _)) => Ok(
        entries
          .into_iter()
          .map(|e| SearchEntry::construct(e).dn)
          .collect(),
      ),
      Err(LdapError::LdapResult { result }) if result.rc == NO_SUCH_OBJECT => {
        Ok(Vec::new())
      }
      Err(e) => Err(e.into()),
    }
  }
}
