//! 드라이버 대기 중단 신호

use std::time::Duration;
use tokio::sync::watch;

/// 엔진이 보관하는 중지 요청 송신측
pub struct StopHandle {
  tx: watch::Sender<bool>,
}

/// 드라이버가 보관하는 수신측
pub struct StopSignal {
  rx: watch::Receiver<bool>,
}

pub fn stop_pair() -> (StopHandle, StopSignal) {
  let (tx, rx) = watch::channel(false);
  (StopHandle { tx }, StopSignal { rx })
}

impl StopHandle {
  pub fn trigger(&self) {
    // 수신측이 이미 종료했으면 무시
    let _ = self.tx.send(true);
  }
}

impl StopSignal {
  /// 절대 울리지 않는 신호
  pub fn never() -> Self {
    let (_, signal) = stop_pair();
    signal
  }

  pub fn is_triggered(&self) -> bool {
    *self.rx.borrow()
  }

  /// `duration` 동안 대기하되 중지 요청이 오면 즉시 깨어난다
  pub async fn pause(&mut self, duration: Duration) {
    if self.is_triggered() {
      return;
    }
    tokio::select! {
      _ = tokio::time::sleep(duration) => {}
      Ok(()) = self.rx.changed() => {}
    }
  }
}
