pub mod backoff;
pub mod bacula_api;
pub mod whatsapp_api;
