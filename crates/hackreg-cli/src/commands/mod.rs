pub mod export;
pub mod ldap;
pub mod mailman;
pub mod membership;
pub mod serve;
