// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use jiff::Zoned;

/// The time source of time-based rollovers.
#[derive(Debug, Clone, Default)]
pub(crate) enum Clock {
    /// The system clock in the system timezone.
    #[default]
    System,
    #[cfg(test)]
    Manual(manual::ManualClock),
}

impl Clock {
    pub(crate) fn now(&self) -> Zoned {
        match self {
            Clock::System => Zoned::now(),
            #[cfg(test)]
            Clock::Manual(clock) => clock.now(),
        }
    }
}

#[cfg(test)]
pub(crate) mod manual {
    use std::sync::Arc;
    use std::sync::Mutex;

    use jiff::Span;
    use jiff::Zoned;

    use super::Clock;

    /// A clock that only moves when told to. Clones share the same time.
    #[derive(Debug, Clone)]
    pub(crate) struct ManualClock {
        now: Arc<Mutex<Zoned>>,
    }

    impl ManualClock {
        pub(crate) fn new(now: Zoned) -> Self {
            Self {
                now: Arc::new(Mutex::new(now)),
            }
        }

        pub(crate) fn now(&self) -> Zoned {
            self.now.lock().unwrap().clone()
        }

        pub(crate) fn advance(&self, span: Span) {
            let mut now = self.now.lock().unwrap();
            *now = now.checked_add(span).unwrap();
        }
    }

    impl From<ManualClock> for Clock {
        fn from(clock: ManualClock) -> Self {
            Clock::Manual(clock)
        }
    }
}
