mod concurrency;
mod lifecycle;
mod publish;
mod update;
