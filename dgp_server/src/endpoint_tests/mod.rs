mod helpers;
mod hmac;
mod mocks;
mod operator;
mod orders;
